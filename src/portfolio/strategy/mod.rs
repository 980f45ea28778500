//! Strategy plugins: pure functions from (market data, asof, active set) to
//! target weights. Every strategy is deterministic — identical inputs must
//! produce bit-identical output, so replay tests can assert on exact numbers.

mod equal_weight;
mod mean_variance;
mod risk_parity;

pub use equal_weight::EqualWeight;
pub use mean_variance::MeanVariance;
pub use risk_parity::RiskParity;

use crate::data::PriceView;
use crate::error::Result;
use crate::portfolio::constraints::Constraints;
use crate::rsc::RollingStatsCache;
use crate::types::{DayIndex, Symbol, Weight};
use std::collections::BTreeMap;

/// A pluggable portfolio-construction rule.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Compute target weights for `symbols` as of `asof`, already projected
    /// onto `constraints`' feasible set.
    fn target_weights(
        &self,
        rsc: &mut RollingStatsCache,
        view: &dyn PriceView,
        asof: DayIndex,
        symbols: &[Symbol],
        constraints: &Constraints,
        classes: &BTreeMap<Symbol, String>,
    ) -> Result<BTreeMap<Symbol, Weight>>;
}

/// Converts a dense per-symbol vector (in `symbols` order) to a sparse map.
pub(crate) fn vec_to_map(symbols: &[Symbol], values: &[f64]) -> BTreeMap<Symbol, Weight> {
    symbols.iter().copied().zip(values.iter().copied()).collect()
}

/// Pulls values back out of a map in `symbols` order, defaulting missing
/// entries to zero (a symbol the projection trimmed to nothing).
pub(crate) fn map_to_vec(map: &BTreeMap<Symbol, Weight>, symbols: &[Symbol]) -> Vec<f64> {
    symbols.iter().map(|s| map.get(s).copied().unwrap_or(0.0)).collect()
}
