//! File-based persistence for backtest results via JSON.
//!
//! A finished [`BacktestOutput`] saves as a single JSON document; the
//! rebalance event log alone can also be written and read back in JSON
//! Lines format (one event per line), useful for streaming a long run's
//! events to disk incrementally rather than holding the whole output in
//! memory until the end.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::backtest::{BacktestOutput, RebalanceEvent};

/// Serializes `output` as pretty-printed JSON and writes it to `path`.
pub fn save_output(output: &BacktestOutput, path: &Path) -> io::Result<()> {
    let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

/// Reads and deserializes a [`BacktestOutput`] previously written by
/// [`save_output`].
pub fn load_output(path: &Path) -> io::Result<BacktestOutput> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(io::Error::other)
}

/// Writes `events` to `path` as JSON Lines, one [`RebalanceEvent`] per line.
pub fn save_events(events: &[RebalanceEvent], path: &Path) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    for event in events {
        let json = serde_json::to_string(event).map_err(io::Error::other)?;
        writeln!(writer, "{json}")?;
    }
    writer.flush()
}

/// Reads a JSON Lines event log previously written by [`save_events`].
/// Empty lines are skipped.
pub fn load_events(path: &Path) -> io::Result<Vec<RebalanceEvent>> {
    let file = std::fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let mut events = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: RebalanceEvent = serde_json::from_str(line)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {e}", line_num + 1)))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::{BacktestConfig, BacktestEngine, RebalanceFrequency};
    use crate::data::{CalendarTag, MarketData, Panel, VecCalendar};
    use crate::portfolio::{compute_metrics, Constraints, EqualWeight, TransactionCostModel};
    use crate::types::Symbol;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn test_path(name: &str) -> PathBuf {
        PathBuf::from(std::env::var("CARGO_TARGET_TMPDIR").unwrap_or_else(|_| std::env::temp_dir().display().to_string()))
            .join(format!("nanofolio_persistence_test_{name}.json"))
    }

    fn sample_output() -> BacktestOutput {
        let symbols = vec![Symbol::new("A")];
        let prices = Panel::new(symbols.clone(), vec![vec![100.0], vec![101.0], vec![102.0]]);
        let returns = Panel::new(symbols.clone(), vec![vec![0.0], vec![0.01], vec![0.0099009900990099]]);
        let market = MarketData::new(prices, returns).unwrap();
        let calendar = VecCalendar(vec![CalendarTag::default(); 3]);
        let config = BacktestConfig {
            start_day: 0,
            end_day: 3,
            initial_capital: 1000.0,
            rebalance_frequency: RebalanceFrequency::Annual,
            opportunistic_band: 0.0,
            force_rebalance_on_drift: false,
            cost_model: TransactionCostModel::zero(),
            constraints: Constraints::default(),
            preselect: None,
            membership: None,
            risk_free_rate: 0.0,
            risk_aversion: 1.0,
            cache_capacity: 100,
            skip_failed_rebalance: false,
        };
        let strategy = EqualWeight;
        let engine = BacktestEngine::new(config, &strategy).unwrap();
        engine.run(&market, &calendar, &symbols, &BTreeMap::new(), &|| false).unwrap()
    }

    #[test]
    fn save_and_load_output_round_trip() {
        let path = test_path("output");
        let output = sample_output();

        save_output(&output, &path).unwrap();
        let loaded = load_output(&path).unwrap();

        assert_eq!(output.equity_curve, loaded.equity_curve);
        assert_eq!(output.events.len(), loaded.events.len());
        let _ = compute_metrics(&loaded.equity_curve, 252.0, 0.0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_and_load_events_round_trip() {
        let path = test_path("events");
        let output = sample_output();

        save_events(&output.events, &path).unwrap();
        let loaded = load_events(&path).unwrap();

        assert_eq!(output.events.len(), loaded.len());
        for (orig, repl) in output.events.iter().zip(&loaded) {
            assert_eq!(orig.day, repl.day);
            assert_eq!(orig.trigger, repl.trigger);
            assert_eq!(orig.total_cost, repl.total_cost);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_nonexistent_file_errors() {
        let result = load_output(Path::new("definitely_missing_nanofolio_output.json"));
        assert!(result.is_err());
    }
}
