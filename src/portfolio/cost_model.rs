//! Transaction-cost modeling.

use crate::error::{Error, Result};

/// Models transaction costs for portfolio rebalancing.
///
/// `cost(trade_value) = max(commission_pct * |trade_value|, min_commission) +
/// slippage_bps * 1e-4 * |trade_value|`. Zero trade value incurs zero cost.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionCostModel {
    /// Commission as a fraction of notional (e.g., 0.001 = 10 bps).
    pub commission_pct: f64,
    /// Minimum fee charged per trade, regardless of size.
    pub min_commission: f64,
    /// Slippage estimate, in basis points of notional.
    pub slippage_bps: f64,
}

impl TransactionCostModel {
    /// A zero-cost model (no fees, no slippage).
    pub fn zero() -> Self {
        Self {
            commission_pct: 0.0,
            min_commission: 0.0,
            slippage_bps: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("commission_pct", self.commission_pct),
            ("min_commission", self.min_commission),
            ("slippage_bps", self.slippage_bps),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_config(name, "must be a non-negative finite number"));
            }
        }
        Ok(())
    }

    /// Compute the cost for a single trade with the given (signed or
    /// unsigned) trade value. Returns a non-negative cost, or
    /// `TransactionCostError` if `trade_value` is non-finite.
    pub fn cost(&self, trade_value: f64) -> Result<f64> {
        if !trade_value.is_finite() {
            return Err(Error::TransactionCostError {
                message: format!("trade_value must be finite, got {trade_value}"),
            });
        }
        let value = trade_value.abs();
        if value == 0.0 {
            return Ok(0.0);
        }
        let commission = (self.commission_pct * value).max(self.min_commission);
        let slippage = self.slippage_bps * 1e-4 * value;
        Ok(commission + slippage)
    }

    /// Sum of [`Self::cost`] over a batch of trade values.
    pub fn batch_cost(&self, trade_values: &[f64]) -> Result<f64> {
        let mut total = 0.0;
        for &v in trade_values {
            total += self.cost(v)?;
        }
        Ok(total)
    }
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self::zero()
    }
}
