//! Mean-variance strategy: maximises `mu . w - (risk_aversion / 2) * w' Sigma w`
//! via projected-gradient ascent over caller-supplied [`Constraints`] (cash
//! is allowed: `sum(w) <= leverage_cap`, not `== 1`).

use super::{map_to_vec, vec_to_map, Strategy};
use crate::data::PriceView;
use crate::error::{Error, Result};
use crate::optimize::mat_vec_mul;
use crate::portfolio::constraints::Constraints;
use crate::rsc::RollingStatsCache;
use crate::types::{DayIndex, Symbol, Weight};
use std::collections::BTreeMap;

const MAX_ITERATIONS: usize = 450;
const INITIAL_LR: f64 = 0.08;
const LR_DECAY: f64 = 0.995;

/// Mean-variance allocation over a trailing `lookback`-day window.
#[derive(Clone, Copy, Debug)]
pub struct MeanVariance {
    pub lookback: u32,
    pub risk_aversion: f64,
}

impl Strategy for MeanVariance {
    fn name(&self) -> &'static str {
        "mean_variance"
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
        let mu = rsc.mean(view, start, asof, symbols);
        let cov = rsc.cov(view, start, asof, symbols);
        let n = symbols.len();

        let mut w = vec![1.0 / n as f64; n];
        let mut lr = INITIAL_LR;

        for _ in 0..MAX_ITERATIONS {
            let sigma_w = mat_vec_mul(&cov, &w);
            let grad: Vec<f64> = mu
                .iter()
                .zip(&sigma_w)
                .map(|(m, sw)| m - self.risk_aversion * sw)
                .collect();

            let candidate: Vec<f64> = w.iter().zip(&grad).map(|(wi, gi)| wi + lr * gi).collect();
            let projected = project_vec(&candidate, symbols, constraints, classes)?;

            let moved = projected
                .iter()
                .zip(&w)
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();

            w = projected;
            if moved < 1e-16 {
                break;
            }
            lr *= LR_DECAY;
        }

        if w.iter().any(|v| !v.is_finite()) {
            return Err(Error::rebalance(asof, "mean-variance solver produced non-finite weights"));
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
