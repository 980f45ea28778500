//! Position tracking for a single symbol, in fractional shares.

use crate::types::Symbol;

/// A position in a single instrument.
///
/// Tracks quantity (positive = long, negative = short), average entry price,
/// and realized PnL. Quantities are fractional `f64` shares — the engine
/// places no restriction on fractional-share trading (rounding to whole
/// shares, if desired, is an integration concern outside this crate).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub symbol: Symbol,
    /// Net quantity: positive = long, negative = short, zero = flat.
    pub quantity: f64,
    /// Volume-weighted average entry price.
    pub avg_entry_price: f64,
    /// Cumulative realized PnL.
    pub realized_pnl: f64,
    /// Cumulative cost of entry (quantity * avg_entry_price), used for VWAP tracking.
    total_cost: f64,
}

impl Position {
    /// Create a new flat position for the given symbol.
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            quantity: 0.0,
            avg_entry_price: 0.0,
            realized_pnl: 0.0,
            total_cost: 0.0,
        }
    }

    /// Apply a fill to this position.
    ///
    /// `qty` is signed: positive = buy, negative = sell.
    ///
    /// If the fill increases the position (same direction), the average
    /// entry price is updated via VWAP. If it reduces or flips the position,
    /// realized PnL is recorded for the closed portion.
    pub fn apply_fill(&mut self, qty: f64, price: f64) {
        if qty == 0.0 {
            return;
        }

        let same_direction = (self.quantity >= 0.0 && qty > 0.0) || (self.quantity <= 0.0 && qty < 0.0);

        if self.quantity == 0.0 {
            self.quantity = qty;
            self.avg_entry_price = price;
            self.total_cost = qty * price;
        } else if same_direction {
            self.total_cost += qty * price;
            self.quantity += qty;
            self.avg_entry_price = self.total_cost / self.quantity;
        } else {
            let close_qty = qty.abs().min(self.quantity.abs());
            let pnl_per_unit = if self.quantity > 0.0 {
                price - self.avg_entry_price
            } else {
                self.avg_entry_price - price
            };
            self.realized_pnl += pnl_per_unit * close_qty;

            let net = self.quantity + qty;
            if net.abs() < 1e-12 {
                self.quantity = 0.0;
                self.avg_entry_price = 0.0;
                self.total_cost = 0.0;
            } else if (net > 0.0) == (self.quantity > 0.0) {
                self.total_cost -= close_qty * self.avg_entry_price;
                self.quantity = net;
                self.avg_entry_price = self.total_cost / self.quantity;
            } else {
                self.quantity = net;
                self.avg_entry_price = price;
                self.total_cost = net * price;
            }
        }
    }

    /// Current market value at the given price.
    #[inline]
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Unrealized PnL at the given market price.
    #[inline]
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.quantity == 0.0 {
            return 0.0;
        }
        (price - self.avg_entry_price) * self.quantity
    }

    /// Returns true if the position is (numerically) flat.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.quantity.abs() < 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> Symbol {
        Symbol::new("AAPL")
    }

    #[test]
    fn new_position_is_flat() {
        let pos = Position::new(sym());
        assert!(pos.is_flat());
        assert_eq!(pos.quantity, 0.0);
        assert_eq!(pos.unrealized_pnl(100.0), 0.0);
    }

    #[test]
    fn open_long() {
        let mut pos = Position::new(sym());
        pos.apply_fill(100.0, 50.0);
        assert_eq!(pos.quantity, 100.0);
        assert_eq!(pos.avg_entry_price, 50.0);
        assert_eq!(pos.market_value(55.0), 5500.0);
        assert_eq!(pos.unrealized_pnl(55.0), 500.0);
    }

    #[test]
    fn fractional_shares_supported() {
        let mut pos = Position::new(sym());
        pos.apply_fill(12.5, 40.0);
        pos.apply_fill(-2.5, 45.0);
        assert!((pos.quantity - 10.0).abs() < 1e-9);
        assert!((pos.realized_pnl - 2.5 * 5.0).abs() < 1e-9);
    }

    #[test]
    fn add_to_long_vwap() {
        let mut pos = Position::new(sym());
        pos.apply_fill(100.0, 50.0);
        pos.apply_fill(100.0, 60.0);
        assert_eq!(pos.quantity, 200.0);
        assert_eq!(pos.avg_entry_price, 55.0);
    }

    #[test]
    fn close_long_with_profit() {
        let mut pos = Position::new(sym());
        pos.apply_fill(100.0, 50.0);
        pos.apply_fill(-100.0, 60.0);
        assert!(pos.is_flat());
        assert_eq!(pos.realized_pnl, 1000.0);
    }

    #[test]
    fn flip_long_to_short() {
        let mut pos = Position::new(sym());
        pos.apply_fill(100.0, 50.0);
        pos.apply_fill(-150.0, 60.0);
        assert_eq!(pos.quantity, -50.0);
        assert_eq!(pos.avg_entry_price, 60.0);
        assert_eq!(pos.realized_pnl, 1000.0);
    }

    #[test]
    fn short_position() {
        let mut pos = Position::new(sym());
        pos.apply_fill(-100.0, 50.0);
        assert_eq!(pos.unrealized_pnl(45.0), 500.0);
        assert_eq!(pos.unrealized_pnl(55.0), -500.0);
    }

    #[test]
    fn zero_fill_is_noop() {
        let mut pos = Position::new(sym());
        pos.apply_fill(100.0, 50.0);
        pos.apply_fill(0.0, 60.0);
        assert_eq!(pos.quantity, 100.0);
        assert_eq!(pos.avg_entry_price, 50.0);
    }
}
