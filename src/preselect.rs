//! Preselector: ranks the eligible universe by a factor (or weighted
//! combination of z-scored factors) and returns the top-K symbols.
//! Deterministic and idempotent: ties break lexicographically by symbol.

use crate::data::PriceView;
use crate::error::{Error, Result};
use crate::factor::{low_vol, momentum};
use crate::types::{DayIndex, Symbol};

/// Which factor(s) the preselector ranks by.
#[derive(Clone, Debug)]
pub enum Method {
    Momentum,
    LowVolatility,
    Combined { momentum_weight: f64, low_vol_weight: f64 },
}

#[derive(Clone, Debug)]
pub struct PreselectConfig {
    pub method: Method,
    pub lookback: u32,
    pub skip: u32,
    pub min_periods: usize,
    pub top_k: usize,
}

impl PreselectConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::invalid_config("top_k", "must be positive"));
        }
        if self.skip as usize >= self.lookback as usize {
            return Err(Error::invalid_config("skip", "must be less than lookback"));
        }
        if self.min_periods > self.lookback as usize {
            return Err(Error::invalid_config(
                "min_periods",
                "must not exceed lookback",
            ));
        }
        if let Method::Combined {
            momentum_weight,
            low_vol_weight,
        } = self.method
        {
            if momentum_weight < 0.0 || low_vol_weight < 0.0 {
                return Err(Error::invalid_config(
                    "combined weights",
                    "must be non-negative",
                ));
            }
            if momentum_weight == 0.0 && low_vol_weight == 0.0 {
                return Err(Error::invalid_config(
                    "combined weights",
                    "at least one weight must be positive",
                ));
            }
        }
        Ok(())
    }
}

pub struct Preselector {
    config: PreselectConfig,
}

impl Preselector {
    pub fn new(config: PreselectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Select up to `top_k` symbols from `eligible_universe`, ranked by the
    /// configured factor. Never raises on data sparsity — returns a shorter
    /// (possibly empty) list instead.
    pub fn select(
        &self,
        view: &dyn PriceView,
        asof: DayIndex,
        eligible_universe: &[Symbol],
    ) -> Vec<Symbol> {
        self.rank(view, asof, eligible_universe, self.config.top_k)
    }

    /// Configured `top_k`, exposed so callers (the membership policy, via the
    /// engine) know where the "inside" cutoff falls when they ask for a
    /// longer ranking via [`Self::rank`].
    pub fn top_k(&self) -> usize {
        self.config.top_k
    }

    /// Like [`Self::select`], but returns up to `limit` symbols instead of
    /// the configured `top_k`. Used by the engine to hand the membership
    /// policy a ranking deep enough to cover its rank buffer (`top_k +
    /// buffer_rank`), since membership retention needs to see symbols that
    /// rank just outside `top_k`.
    pub fn rank(
        &self,
        view: &dyn PriceView,
        asof: DayIndex,
        eligible_universe: &[Symbol],
        limit: usize,
    ) -> Vec<Symbol> {
        let scores = self.score(view, asof, eligible_universe);
        let mut ranked: Vec<(Symbol, f64)> = scores.into_iter().collect();
        ranked.sort_by(|(sa, a), (sb, b)| {
            cmp_desc(*a, *b).then_with(|| sa.cmp(sb))
        });
        ranked
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .take(limit)
            .map(|(s, _)| s)
            .collect()
    }

    fn score(
        &self,
        view: &dyn PriceView,
        asof: DayIndex,
        symbols: &[Symbol],
    ) -> Vec<(Symbol, f64)> {
        match self.config.method {
            Method::Momentum => {
                let snap = momentum(
                    view,
                    asof,
                    symbols,
                    self.config.lookback,
                    self.config.skip,
                    self.config.min_periods,
                );
                symbols.iter().map(|s| (*s, snap.values[s])).collect()
            }
            Method::LowVolatility => {
                let snap = low_vol(view, asof, symbols, self.config.lookback, self.config.min_periods);
                symbols.iter().map(|s| (*s, snap.values[s])).collect()
            }
            Method::Combined {
                momentum_weight,
                low_vol_weight,
            } => {
                let mom = momentum(
                    view,
                    asof,
                    symbols,
                    self.config.lookback,
                    self.config.skip,
                    self.config.min_periods,
                );
                let vol = low_vol(view, asof, symbols, self.config.lookback, self.config.min_periods);

                let mom_values: Vec<f64> = symbols.iter().map(|s| mom.values[s]).collect();
                let vol_values: Vec<f64> = symbols.iter().map(|s| vol.values[s]).collect();
                let mom_z = z_score(&mom_values);
                let vol_z = z_score(&vol_values);

                let total_weight = momentum_weight + low_vol_weight;
                symbols
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        let combined =
                            (momentum_weight * mom_z[i] + low_vol_weight * vol_z[i]) / total_weight;
                        (*s, combined)
                    })
                    .collect()
            }
        }
    }
}

fn cmp_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

/// Z-score a slice, ignoring NaN for the mean/std. NaN inputs map to
/// `min(finite z) - 1` so they always sort last.
fn z_score(values: &[f64]) -> Vec<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return vec![f64::NAN; values.len()];
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();

    let z_of = |v: f64| if std > 0.0 { (v - mean) / std } else { 0.0 };
    let finite_z: Vec<f64> = finite.iter().map(|&v| z_of(v)).collect();
    let min_z = finite_z.iter().cloned().fold(f64::INFINITY, f64::min);
    let fallback = if min_z.is_finite() { min_z - 1.0 } else { -1.0 };

    values
        .iter()
        .map(|&v| if v.is_finite() { z_of(v) } else { fallback })
        .collect()
}
