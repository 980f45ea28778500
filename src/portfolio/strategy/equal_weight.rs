//! Equal-weight strategy: splits the active set evenly.

use super::Strategy;
use crate::data::PriceView;
use crate::error::Result;
use crate::portfolio::constraints::Constraints;
use crate::rsc::RollingStatsCache;
use crate::types::{DayIndex, Symbol, Weight};
use std::collections::BTreeMap;

/// Allocates `1/N` to each symbol in the active set, then projects through
/// `constraints` (so a binding `max_per_asset` or class cap still applies).
#[derive(Clone, Copy, Debug, Default)]
pub struct EqualWeight;

impl Strategy for EqualWeight {
    fn name(&self) -> &'static str {
        "equal_weight"
    }

    fn target_weights(
        &self,
        _rsc: &mut RollingStatsCache,
        _view: &dyn PriceView,
        _asof: DayIndex,
        symbols: &[Symbol],
        constraints: &Constraints,
        classes: &BTreeMap<Symbol, String>,
    ) -> Result<BTreeMap<Symbol, Weight>> {
        if symbols.is_empty() {
            return Ok(BTreeMap::new());
        }
        let w = 1.0 / symbols.len() as f64;
        let raw: BTreeMap<Symbol, Weight> = symbols.iter().map(|s| (*s, w)).collect();
        constraints.project(&raw, classes)
    }
}
