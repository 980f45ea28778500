//! Factor Engine: per-asset momentum and low-volatility scores computed from
//! a trailing return window. Pure functions — never raise on data sparsity,
//! they simply return NaN for symbols without enough history.

use crate::data::PriceView;
use crate::stats::spearman;
use crate::types::{DayIndex, Symbol};
use std::collections::BTreeMap;

/// A factor's scores and ranks for one rebalance date.
#[derive(Clone, Debug)]
pub struct FactorSnapshot {
    pub asof: DayIndex,
    pub factor_name: String,
    pub values: BTreeMap<Symbol, f64>,
}

impl FactorSnapshot {
    /// Dense rank (1 = best score), NaN scores rank last, ties broken by
    /// symbol lexicographic order (deterministic).
    pub fn ranks(&self) -> BTreeMap<Symbol, u32> {
        let mut entries: Vec<(Symbol, f64)> =
            self.values.iter().map(|(s, v)| (*s, *v)).collect();
        entries.sort_by(|(sa, a), (sb, b)| cmp_score_desc(*a, *b).then_with(|| sa.cmp(sb)));
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (s, _))| (s, i as u32 + 1))
            .collect()
    }
}

fn cmp_score_desc(a: f64, b: f64) -> std::cmp::Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => std::cmp::Ordering::Equal,
        (true, false) => std::cmp::Ordering::Greater,
        (false, true) => std::cmp::Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal),
    }
}

/// Compound return over `[asof - lookback, asof - skip)`. `skip` trading days
/// immediately before `asof` are excluded to dodge short-term reversal.
/// Returns NaN if fewer than `min_periods` observations are available.
pub fn momentum(
    view: &dyn PriceView,
    asof: DayIndex,
    symbols: &[Symbol],
    lookback: u32,
    skip: u32,
    min_periods: usize,
) -> FactorSnapshot {
    let window_end = asof.saturating_sub(skip);
    let window_start = asof.saturating_sub(lookback);

    let values = symbols
        .iter()
        .map(|&s| {
            let obs: Vec<f64> = (window_start..window_end)
                .filter_map(|d| view.ret(d, s))
                .filter(|r| r.is_finite())
                .collect();
            let score = if obs.len() >= min_periods {
                obs.iter().fold(1.0_f64, |acc, r| acc * (1.0 + r)) - 1.0
            } else {
                f64::NAN
            };
            (s, score)
        })
        .collect();

    FactorSnapshot {
        asof,
        factor_name: "momentum".to_owned(),
        values,
    }
}

/// Negative standard deviation of daily returns over `[asof - lookback,
/// asof)` — higher score means lower realized volatility. NaN if fewer than
/// `min_periods` observations are available.
pub fn low_vol(
    view: &dyn PriceView,
    asof: DayIndex,
    symbols: &[Symbol],
    lookback: u32,
    min_periods: usize,
) -> FactorSnapshot {
    let window_start = asof.saturating_sub(lookback);

    let values = symbols
        .iter()
        .map(|&s| {
            let obs: Vec<f64> = (window_start..asof)
                .filter_map(|d| view.ret(d, s))
                .filter(|r| r.is_finite())
                .collect();
            let score = if obs.len() >= min_periods {
                -sample_std(&obs)
            } else {
                f64::NAN
            };
            (s, score)
        })
        .collect();

    FactorSnapshot {
        asof,
        factor_name: "low_vol".to_owned(),
        values,
    }
}

fn sample_std(obs: &[f64]) -> f64 {
    let n = obs.len() as f64;
    if obs.len() < 2 {
        return 0.0;
    }
    let mean = obs.iter().sum::<f64>() / n;
    let var = obs.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.max(0.0).sqrt()
}

/// Rank correlation (and its p-value) between a factor snapshot's scores and
/// realized forward returns.
///
/// A pure, outside-the-loop reporting function — never called from
/// [`crate::backtest::BacktestEngine::run`], so it cannot leak look-ahead
/// into the simulation. It exists so a caller inspecting a finished run can
/// ask whether a factor actually predicted anything.
pub fn information_coefficient(
    snapshot: &FactorSnapshot,
    forward_returns: &BTreeMap<Symbol, f64>,
) -> (f64, f64) {
    let mut scores = Vec::new();
    let mut rets = Vec::new();
    for (symbol, score) in &snapshot.values {
        if let Some(ret) = forward_returns.get(symbol) {
            if score.is_finite() && ret.is_finite() {
                scores.push(*score);
                rets.push(*ret);
            }
        }
    }
    spearman(&scores, &rets)
}
