//! Error taxonomy shared by every fallible surface in the crate.

use crate::types::{DayIndex, Symbol};
use thiserror::Error;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

fn truncate_symbols(symbols: &[Symbol]) -> String {
    const MAX: usize = 8;
    if symbols.len() <= MAX {
        symbols
            .iter()
            .map(|s| s.as_str().to_owned())
            .collect::<Vec<_>>()
            .join(",")
    } else {
        let head: Vec<String> = symbols[..MAX].iter().map(|s| s.to_string()).collect();
        format!("{}... (+{} more)", head.join(","), symbols.len() - MAX)
    }
}

/// Every fallible operation in the crate returns this error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid config: {message} (parameter: {parameter})")]
    InvalidConfig { parameter: String, message: String },

    #[error("insufficient history at day {day}: need {required} observations for {symbols}, have {available}")]
    InsufficientHistory {
        day: DayIndex,
        required: usize,
        available: usize,
        symbols: String,
    },

    #[error("rebalance failed at day {day}: {cause}")]
    RebalanceError { day: DayIndex, cause: String },

    #[error("transaction cost error: {message}")]
    TransactionCostError { message: String },

    #[error("data quality error at day {day}: {message}")]
    DataQuality { day: DayIndex, message: String },

    #[error("backtest cancelled at day {day}")]
    Cancelled { day: DayIndex },
}

impl Error {
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub fn insufficient_history(
        day: DayIndex,
        required: usize,
        available: usize,
        symbols: &[Symbol],
    ) -> Self {
        Error::InsufficientHistory {
            day,
            required,
            available,
            symbols: truncate_symbols(symbols),
        }
    }

    pub fn rebalance(day: DayIndex, cause: impl Into<String>) -> Self {
        Error::RebalanceError {
            day,
            cause: cause.into(),
        }
    }

    pub fn data_quality(day: DayIndex, message: impl Into<String>) -> Self {
        Error::DataQuality {
            day,
            message: message.into(),
        }
    }

    /// True for errors that are only ever raised before the daily loop starts,
    /// meaning no partial `BacktestOutput` exists yet.
    pub fn is_pre_loop(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. } | Error::InsufficientHistory { .. } | Error::DataQuality { .. }
        )
    }
}
