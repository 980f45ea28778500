//! Price/return panels and the calendar-boundary abstraction the backtest
//! loop drives off. The core never parses dates: a trading day is simply a
//! row index into these panels, and calendar boundaries (week/month/quarter/
//! year) are supplied per row by an injected [`Calendar`].

use crate::types::{DayIndex, Symbol};
use std::collections::BTreeMap;

/// A column-major-addressable panel of values, one row per trading day.
///
/// Missing observations are represented as `f64::NAN`, never a sentinel
/// magic number, per the crate's data-quality contract.
#[derive(Clone, Debug)]
pub struct Panel {
    symbols: Vec<Symbol>,
    column_index: BTreeMap<Symbol, usize>,
    rows: Vec<Vec<f64>>,
}

impl Panel {
    pub fn new(symbols: Vec<Symbol>, rows: Vec<Vec<f64>>) -> Self {
        for row in &rows {
            debug_assert_eq!(row.len(), symbols.len(), "row width must match symbol count");
        }
        let column_index = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (*s, i))
            .collect();
        Self {
            symbols,
            column_index,
            rows,
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_of(&self, symbol: Symbol) -> Option<usize> {
        self.column_index.get(&symbol).copied()
    }

    /// Value for `symbol` at `day`, or `None` if the symbol is unknown or the
    /// day is out of range. May still return `Some(NaN)` for a missing
    /// observation.
    pub fn get(&self, day: DayIndex, symbol: Symbol) -> Option<f64> {
        let col = self.column_of(symbol)?;
        self.rows.get(day as usize).map(|row| row[col])
    }
}

/// Read-only view over prices and returns that the simulation loop queries.
///
/// Kept as a trait (rather than a concrete struct) so tests can substitute a
/// mock that panics on any read at or beyond a given day — the mechanism
/// backing the no-look-ahead property test.
pub trait PriceView {
    fn price(&self, day: DayIndex, symbol: Symbol) -> Option<f64>;
    fn ret(&self, day: DayIndex, symbol: Symbol) -> Option<f64>;
    fn symbols(&self) -> &[Symbol];
    fn num_days(&self) -> usize;

    /// Trailing-window returns for `symbols` over `[start, end)`, column-major
    /// per symbol (`Vec<Vec<f64>>`, outer = row/day, inner = symbol, matching
    /// [`crate::optimize`]'s `Vec<Vec<f64>>` convention). Missing observations
    /// surface as NaN; callers are responsible for min-period checks.
    fn window(&self, start: DayIndex, end: DayIndex, symbols: &[Symbol]) -> Vec<Vec<f64>> {
        (start..end)
            .map(|day| {
                symbols
                    .iter()
                    .map(|s| self.ret(day, *s).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect()
    }
}

/// The concrete in-memory [`PriceView`] used in production: a price panel and
/// a return panel sharing the same row index and symbol universe.
#[derive(Clone, Debug)]
pub struct MarketData {
    prices: Panel,
    returns: Panel,
}

impl MarketData {
    pub fn new(prices: Panel, returns: Panel) -> crate::error::Result<Self> {
        if prices.symbols() != returns.symbols() {
            return Err(crate::error::Error::data_quality(
                0,
                "price and return panels must share the same symbol ordering",
            ));
        }
        if prices.len() != returns.len() {
            return Err(crate::error::Error::data_quality(
                0,
                "price and return panels must share the same number of rows",
            ));
        }
        Ok(Self { prices, returns })
    }

    pub fn prices(&self) -> &Panel {
        &self.prices
    }

    pub fn returns(&self) -> &Panel {
        &self.returns
    }
}

impl PriceView for MarketData {
    fn price(&self, day: DayIndex, symbol: Symbol) -> Option<f64> {
        self.prices.get(day, symbol)
    }

    fn ret(&self, day: DayIndex, symbol: Symbol) -> Option<f64> {
        self.returns.get(day, symbol)
    }

    fn symbols(&self) -> &[Symbol] {
        self.prices.symbols()
    }

    fn num_days(&self) -> usize {
        self.prices.len()
    }
}

/// Calendar-boundary tags for one trading day, supplied by the caller.
///
/// The engine never computes these itself (no holiday calendar is in
/// scope); it only compares consecutive rows' tags to detect a boundary
/// crossing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CalendarTag {
    pub week: u32,
    pub month: u32,
    pub quarter: u32,
    pub year: u32,
}

/// Supplies the [`CalendarTag`] for each trading day in a run.
pub trait Calendar {
    fn tag(&self, day: DayIndex) -> CalendarTag;
}

/// A calendar backed by a plain `Vec<CalendarTag>`, one entry per trading day.
#[derive(Clone, Debug)]
pub struct VecCalendar(pub Vec<CalendarTag>);

impl Calendar for VecCalendar {
    fn tag(&self, day: DayIndex) -> CalendarTag {
        self.0
            .get(day as usize)
            .copied()
            .unwrap_or_default()
    }
}
