//! Risk-parity strategy: weights that equalize each asset's contribution to
//! portfolio variance via a damped cyclic fixed-point iteration, projected
//! onto caller-supplied [`Constraints`] each step.

use super::{map_to_vec, vec_to_map, Strategy};
use crate::data::PriceView;
use crate::error::{Error, Result};
use crate::optimize::{diagonal_only, dot, mat_vec_mul, smallest_eigenvalue, squared_distance};
use crate::portfolio::constraints::Constraints;
use crate::rsc::RollingStatsCache;
use crate::types::{DayIndex, Symbol, Weight};
use std::collections::BTreeMap;

const MAX_ITERATIONS: usize = 600;
const DAMPING_OLD: f64 = 0.6;
const DAMPING_NEW: f64 = 0.4;
/// Spec §4.4: below this, Σ is treated as (near-)singular and the solver
/// falls back to its diagonal (asset-wise variances only).
const MIN_EIGENVALUE: f64 = 1e-8;

/// Risk-parity allocation over a trailing covariance window of `lookback`
/// trading days.
#[derive(Clone, Copy, Debug)]
pub struct RiskParity {
    pub lookback: u32,
}

impl Strategy for RiskParity {
    fn name(&self) -> &'static str {
        "risk_parity"
    }

    fn target_weights(
        &self,
        rsc: &mut RollingStatsCache,
        view: &dyn PriceView,
        asof: DayIndex,
        symbols: &[Symbol],
        constraints: &Constraints,
        classes: &BTreeMap<Symbol, String>,
    ) -> Result<BTreeMap<Symbol, Weight>> {
        if symbols.is_empty() {
            return Ok(BTreeMap::new());
        }
        if symbols.len() == 1 {
            let raw = vec_to_map(symbols, &[1.0]);
            return constraints.project(&raw, classes);
        }

        let start = asof.saturating_sub(self.lookback);
        let raw_cov = rsc.cov(view, start, asof, symbols);
        let cov = if smallest_eigenvalue(&raw_cov) < MIN_EIGENVALUE {
            diagonal_only(&raw_cov)
        } else {
            raw_cov
        };
        let n = symbols.len();

        let mut w = vec![1.0 / n as f64; n];

        for _ in 0..MAX_ITERATIONS {
            let sigma_w = mat_vec_mul(&cov, &w);
            let port_var = dot(&w, &sigma_w).max(1e-12);
            let target = port_var / n as f64;

            let mut next = vec![0.0; n];
            for i in 0..n {
                let rc = (w[i] * sigma_w[i]).abs().max(1e-12);
                let update = w[i] * (target / rc).sqrt();
                next[i] = if update.is_finite() { update.max(0.0) } else { 0.0 };
            }
            let next = project_vec(&next, symbols, constraints, classes)?;

            let damped_raw: Vec<f64> = w.iter().zip(&next).map(|(old, new)| DAMPING_OLD * old + DAMPING_NEW * new).collect();
            let damped = project_vec(&damped_raw, symbols, constraints, classes)?;

            if squared_distance(&damped, &w) < 1e-16 {
                w = damped;
                break;
            }
            w = damped;
        }

        if w.iter().any(|v| !v.is_finite()) {
            return Err(Error::rebalance(asof, "risk parity solver produced non-finite weights"));
        }

        Ok(vec_to_map(symbols, &w))
    }
}

fn project_vec(
    raw: &[f64],
    symbols: &[Symbol],
    constraints: &Constraints,
    classes: &BTreeMap<Symbol, String>,
) -> Result<Vec<f64>> {
    let map = vec_to_map(symbols, raw);
    let projected = constraints.project(&map, classes)?;
    Ok(map_to_vec(&projected, symbols))
}
