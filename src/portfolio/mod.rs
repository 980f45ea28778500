//! Portfolio entity and supporting machinery: target weights, constraints,
//! transaction costs, performance metrics, and the strategy plugins that
//! produce a portfolio's weights.
//!
//! The day-to-day execution state (cash, per-symbol [`Position`]s) is owned
//! by [`crate::backtest::BacktestEngine`], not by [`Portfolio`] itself —
//! `Portfolio` is the declarative "what we're targeting" entity from a
//! single rebalance, not the running ledger.

pub mod constraints;
pub mod cost_model;
pub mod metrics;
pub mod position;
#[cfg(feature = "parallel")]
pub mod sweep;
pub mod strategy;

pub use constraints::Constraints;
pub use cost_model::TransactionCostModel;
pub use metrics::{compute_metrics, compute_metrics_with_activity, PerformanceMetrics};
pub use position::Position;
#[cfg(feature = "parallel")]
pub use sweep::{sweep, SweepCase, SweepResult};
pub use strategy::{EqualWeight, MeanVariance, RiskParity, Strategy};

use crate::error::{Error, Result};
use crate::types::{DayIndex, Symbol, Weight};
use std::collections::BTreeMap;

/// Which strategy plugin produced a [`Portfolio`]'s holdings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StrategyTag {
    EqualWeight,
    RiskParity,
    MeanVariance,
}

impl std::fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyTag::EqualWeight => "equal_weight",
            StrategyTag::RiskParity => "risk_parity",
            StrategyTag::MeanVariance => "mean_variance",
        };
        write!(f, "{name}")
    }
}

/// A target allocation produced by one rebalance: symbol weights plus the
/// provenance (which strategy, under which constraints, as of which day)
/// that produced them.
///
/// Invariants: all weights are finite and `>= 0`; `sum(weights) <= 1 + eps`
/// (the residual is cash).
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portfolio {
    pub holdings: BTreeMap<Symbol, Weight>,
    pub strategy_tag: StrategyTag,
    pub constraints: Constraints,
    pub created_at: DayIndex,
}

impl Portfolio {
    pub fn new(
        holdings: BTreeMap<Symbol, Weight>,
        strategy_tag: StrategyTag,
        constraints: Constraints,
        created_at: DayIndex,
    ) -> Result<Self> {
        let portfolio = Self {
            holdings,
            strategy_tag,
            constraints,
            created_at,
        };
        portfolio.validate()?;
        Ok(portfolio)
    }

    pub fn validate(&self) -> Result<()> {
        const EPS: f64 = 1e-6;
        let sum: f64 = self.holdings.values().sum();
        if sum > 1.0 + EPS {
            return Err(Error::invalid_config(
                "holdings",
                format!("weights sum to {sum}, exceeding 1.0"),
            ));
        }
        for (symbol, w) in &self.holdings {
            if !w.is_finite() || *w < -EPS {
                return Err(Error::invalid_config(
                    "holdings",
                    format!("{symbol} has invalid weight {w}"),
                ));
            }
        }
        Ok(())
    }

    /// Fraction of the portfolio held in cash (the unallocated residual).
    pub fn cash_weight(&self) -> Weight {
        (1.0 - self.holdings.values().sum::<f64>()).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn cash_weight_is_residual() {
        let holdings: BTreeMap<Symbol, Weight> = [(sym("A"), 0.4), (sym("B"), 0.3)].into_iter().collect();
        let p = Portfolio::new(holdings, StrategyTag::EqualWeight, Constraints::default(), 0).unwrap();
        assert!((p.cash_weight() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn fully_invested_has_zero_cash() {
        let holdings: BTreeMap<Symbol, Weight> = [(sym("A"), 0.5), (sym("B"), 0.5)].into_iter().collect();
        let p = Portfolio::new(holdings, StrategyTag::RiskParity, Constraints::default(), 0).unwrap();
        assert!(p.cash_weight().abs() < 1e-12);
    }

    #[test]
    fn rejects_weights_summing_over_one() {
        let holdings: BTreeMap<Symbol, Weight> = [(sym("A"), 0.7), (sym("B"), 0.7)].into_iter().collect();
        assert!(Portfolio::new(holdings, StrategyTag::EqualWeight, Constraints::default(), 0).is_err());
    }

    #[test]
    fn rejects_negative_weight() {
        let holdings: BTreeMap<Symbol, Weight> = [(sym("A"), -0.1)].into_iter().collect();
        assert!(Portfolio::new(holdings, StrategyTag::EqualWeight, Constraints::default(), 0).is_err());
    }

    #[test]
    fn display_shows_strategy_name() {
        assert_eq!(StrategyTag::MeanVariance.to_string(), "mean_variance");
    }
}
