//! # nanofolio
//!
//! A deterministic historical portfolio backtesting engine.
//!
//! Given a matrix of historical prices and returns, a portfolio-construction
//! strategy, a rebalancing policy and a transaction-cost model, the engine
//! replays the trading period day by day and produces an equity curve, a log
//! of rebalance events, and a suite of performance metrics.
//!
//! ## Pipeline
//!
//! Each trading day the [`backtest::BacktestEngine`] marks holdings to
//! market, decides whether to rebalance, and — if so — asks the
//! [`preselect::Preselector`] and [`membership::MembershipPolicy`] for the
//! active set, a [`portfolio::strategy::Strategy`] (via the
//! [`rsc::RollingStatsCache`] and [`factor`] engine when needed) for target
//! weights, the active [`portfolio::Constraints`] to project those weights
//! onto a feasible set, and the [`portfolio::TransactionCostModel`] to cost
//! the resulting trades.
//!
//! ## Quick Start
//!
//! ```
//! use nanofolio::backtest::{BacktestConfig, BacktestEngine, RebalanceFrequency};
//! use nanofolio::data::{CalendarTag, MarketData, Panel, VecCalendar};
//! use nanofolio::portfolio::{Constraints, EqualWeight, TransactionCostModel};
//! use nanofolio::Symbol;
//! use std::collections::BTreeMap;
//!
//! let symbol = Symbol::new("A");
//! let prices = Panel::new(vec![symbol], vec![vec![100.0], vec![101.0], vec![102.0]]);
//! let returns = Panel::new(
//!     vec![symbol],
//!     vec![vec![0.0], vec![0.01], vec![0.0099009900990099]],
//! );
//! let market = MarketData::new(prices, returns).unwrap();
//! let calendar = VecCalendar(vec![CalendarTag::default(); 3]);
//!
//! let config = BacktestConfig {
//!     start_day: 0,
//!     end_day: 3,
//!     initial_capital: 1000.0,
//!     rebalance_frequency: RebalanceFrequency::Annual,
//!     opportunistic_band: 0.0,
//!     force_rebalance_on_drift: false,
//!     cost_model: TransactionCostModel::zero(),
//!     constraints: Constraints::default(),
//!     preselect: None,
//!     membership: None,
//!     risk_free_rate: 0.0,
//!     risk_aversion: 1.0,
//!     cache_capacity: 100,
//!     skip_failed_rebalance: false,
//! };
//!
//! let strategy = EqualWeight;
//! let engine = BacktestEngine::new(config, &strategy).unwrap();
//! let output = engine
//!     .run(&market, &calendar, &[symbol], &BTreeMap::new(), &|| false)
//!     .unwrap();
//!
//! assert_eq!(output.equity_curve.len(), 3);
//! assert_eq!(output.equity_curve[0], 1000.0);
//! assert_eq!(output.events.len(), 1);
//! ```
//!
//! ## Strategies
//!
//! Three [`portfolio::strategy::Strategy`] plugins are built in:
//! [`portfolio::EqualWeight`], [`portfolio::RiskParity`] and
//! [`portfolio::MeanVariance`]. All are pure functions of (market data, asof,
//! active symbols, constraints) and must produce bit-identical weights for
//! identical inputs, so replay tests can assert on exact numbers.
//!
//! ## Determinism
//!
//! Hash-based maps never drive iteration order on a path that affects
//! output: [`types::Symbol`]-keyed state uses `BTreeMap`, and every sort with
//! a possible tie breaks lexicographically by symbol. Given identical
//! inputs, two runs of [`backtest::BacktestEngine::run`] produce
//! byte-identical equity curves and event logs.

pub mod backtest;
pub mod data;
pub mod error;
pub mod factor;
pub mod membership;
pub(crate) mod optimize;
#[cfg(feature = "persistence")]
pub mod persistence;
pub mod portfolio;
pub mod preselect;
pub mod rsc;
pub mod sink;
pub mod stats;
pub mod types;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestOutput, RebalanceEvent, Trigger};
pub use error::{Error, Result};
pub use types::{DayIndex, Symbol, Weight};
