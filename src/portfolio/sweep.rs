//! Parallel strategy comparison: independent backtests, one per configuration.
//!
//! Each [`SweepCase`] is run as its own [`BacktestEngine`], which constructs
//! a private [`crate::rsc::RollingStatsCache`] internally — cases never share
//! mutable state, so running them concurrently is safe by construction.

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestOutput};
use crate::data::{Calendar, PriceView};
use crate::error::Result;
use crate::portfolio::Strategy;
use crate::types::Symbol;
use std::collections::BTreeMap;

/// One (config, strategy) pairing to backtest independently of the others.
pub struct SweepCase<'a> {
    pub label: &'a str,
    pub config: BacktestConfig,
    pub strategy: &'a (dyn Strategy + Sync),
}

/// One case's outcome, tagged with the label it was submitted under.
pub struct SweepResult<'a> {
    pub label: &'a str,
    pub output: Result<BacktestOutput>,
}

/// Runs every case in `cases` in parallel and collects the results in the
/// same order they were submitted.
#[cfg(feature = "parallel")]
pub fn sweep<'a>(
    cases: &[SweepCase<'a>],
    view: &(dyn PriceView + Sync),
    calendar: &(dyn Calendar + Sync),
    universe: &[Symbol],
    classes: &BTreeMap<Symbol, String>,
) -> Vec<SweepResult<'a>> {
    use rayon::prelude::*;

    cases
        .par_iter()
        .map(|case| {
            let output = BacktestEngine::new(case.config.clone(), case.strategy)
                .and_then(|engine| engine.run(view, calendar, universe, classes, &|| false));
            SweepResult {
                label: case.label,
                output,
            }
        })
        .collect()
}

#[cfg(test)]
#[cfg(feature = "parallel")]
mod tests {
    use super::*;
    use crate::backtest::RebalanceFrequency;
    use crate::data::{CalendarTag, MarketData, Panel, VecCalendar};
    use crate::portfolio::{Constraints, EqualWeight, RiskParity, TransactionCostModel};

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn trending_market() -> MarketData {
        let symbols = vec![sym("A"), sym("B")];
        let prices = Panel::new(
            symbols.clone(),
            vec![
                vec![100.0, 100.0],
                vec![101.0, 99.5],
                vec![102.0, 99.0],
                vec![103.0, 98.5],
                vec![104.0, 98.0],
            ],
        );
        let returns = Panel::new(
            symbols,
            vec![
                vec![0.0, 0.0],
                vec![0.01, -0.005],
                vec![0.0099, -0.005],
                vec![0.0098, -0.00505],
                vec![0.0097, -0.00508],
            ],
        );
        MarketData::new(prices, returns).unwrap()
    }

    fn base_config() -> BacktestConfig {
        BacktestConfig {
            start_day: 0,
            end_day: 5,
            initial_capital: 1000.0,
            rebalance_frequency: RebalanceFrequency::Daily,
            opportunistic_band: 0.2,
            force_rebalance_on_drift: false,
            cost_model: TransactionCostModel::zero(),
            constraints: Constraints::default(),
            preselect: None,
            membership: None,
            risk_free_rate: 0.0,
            risk_aversion: 2.0,
            cache_capacity: 50,
            skip_failed_rebalance: false,
        }
    }

    #[test]
    fn runs_cases_independently_and_preserves_labels() {
        let md = trending_market();
        let calendar = VecCalendar(vec![CalendarTag::default(); 5]);
        let symbols = vec![sym("A"), sym("B")];

        let equal_weight = EqualWeight;
        let risk_parity = RiskParity { lookback: 3 };
        let cases = vec![
            SweepCase {
                label: "equal_weight",
                config: base_config(),
                strategy: &equal_weight,
            },
            SweepCase {
                label: "risk_parity",
                config: base_config(),
                strategy: &risk_parity,
            },
        ];

        let results = sweep(&cases, &md, &calendar, &symbols, &BTreeMap::new());

        assert_eq!(results.len(), 2);
        let labels: Vec<&str> = results.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["equal_weight", "risk_parity"]);
        for r in &results {
            assert!(r.output.is_ok());
        }
    }
}
