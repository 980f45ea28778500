//! Injected diagnostic sink. The core never touches a global logger; callers
//! that want structured diagnostics (a stale asset excluded from a rebalance,
//! a cash-shortfall scaling event, a skipped failed rebalance) pass in an
//! `&dyn EventSink`. `Severity` reuses `log::Level` so a caller's sink can
//! trivially forward into `log::log!` without this crate depending on any
//! particular logging backend.

pub use log::Level as Severity;

/// Receives non-fatal diagnostic events raised during a backtest run.
pub trait EventSink {
    fn record(&self, severity: Severity, message: &str);
}

/// Discards every event. The default when a caller passes no sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _severity: Severity, _message: &str) {}
}

/// Forwards every event into the `log` crate at the matching level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, severity: Severity, message: &str) {
        log::log!(severity, "{message}");
    }
}
