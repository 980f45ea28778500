//! Rolling-Statistics Cache: memoizes sample covariance matrices and mean
//! vectors over a trailing return window, keyed by `(window_start,
//! window_end, sorted_symbol_tuple)`. Bounded LRU — entries evict oldest-used
//! first once `capacity` is reached, per the cache's intended use as a
//! read-mostly memo across repeated rebalances with overlapping windows.

use crate::data::PriceView;
use crate::optimize::{column_means, covariance_matrix};
use crate::types::{DayIndex, Symbol};
use std::collections::HashMap;

/// Default bounded capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    start: DayIndex,
    end: DayIndex,
    symbols: Vec<Symbol>,
}

impl CacheKey {
    fn new(start: DayIndex, end: DayIndex, symbols: &[Symbol]) -> Self {
        let mut symbols = symbols.to_vec();
        symbols.sort();
        Self {
            start,
            end,
            symbols,
        }
    }
}

struct CacheEntry {
    cov: Vec<Vec<f64>>,
    mean: Vec<f64>,
    last_used: u64,
}

/// A bounded, LRU-evicted memo of `(covariance, mean)` over `(start, end,
/// symbols)` windows.
///
/// Single-threaded callers need no synchronization; a multi-threaded
/// strategy-comparison run gives each backtest its own private cache (see
/// [`crate::portfolio::sweep`]) rather than sharing one across threads.
pub struct RollingStatsCache {
    capacity: usize,
    entries: HashMap<CacheKey, CacheEntry>,
    clock: u64,
}

impl RollingStatsCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            clock: 0,
        }
    }

    /// Sample covariance matrix over `returns[start..end]` restricted to
    /// `symbols`, in the symbol order passed in (not the sorted cache-key
    /// order).
    pub fn cov(
        &mut self,
        view: &dyn PriceView,
        start: DayIndex,
        end: DayIndex,
        symbols: &[Symbol],
    ) -> Vec<Vec<f64>> {
        let (cov, _) = self.stats(view, start, end, symbols);
        cov
    }

    /// Sample mean vector over `returns[start..end]` restricted to `symbols`.
    pub fn mean(
        &mut self,
        view: &dyn PriceView,
        start: DayIndex,
        end: DayIndex,
        symbols: &[Symbol],
    ) -> Vec<f64> {
        let (_, mean) = self.stats(view, start, end, symbols);
        mean
    }

    fn stats(
        &mut self,
        view: &dyn PriceView,
        start: DayIndex,
        end: DayIndex,
        symbols: &[Symbol],
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        let key = CacheKey::new(start, end, symbols);
        self.clock += 1;
        let now = self.clock;

        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = now;
            return (
                reorder_cov(&entry.cov, &key.symbols, symbols),
                reorder_vec(&entry.mean, &key.symbols, symbols),
            );
        }

        let window = view.window(start, end, &key.symbols);
        let cov = covariance_matrix(&window);
        let mean = column_means(&window);

        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            key.clone(),
            CacheEntry {
                cov: cov.clone(),
                mean: mean.clone(),
                last_used: now,
            },
        );

        (
            reorder_cov(&cov, &key.symbols, symbols),
            reorder_vec(&mean, &key.symbols, symbols),
        )
    }

    fn evict_oldest(&mut self) {
        if let Some(victim) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&victim);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Re-maps a mean vector computed in `from_order` to `to_order`.
fn reorder_vec(values: &[f64], from_order: &[Symbol], to_order: &[Symbol]) -> Vec<f64> {
    to_order
        .iter()
        .map(|s| {
            let idx = from_order.iter().position(|f| f == s).unwrap_or(0);
            values[idx]
        })
        .collect()
}

/// Re-maps a covariance matrix computed in `from_order` to `to_order`.
fn reorder_cov(cov: &[Vec<f64>], from_order: &[Symbol], to_order: &[Symbol]) -> Vec<Vec<f64>> {
    let idx: Vec<usize> = to_order
        .iter()
        .map(|s| from_order.iter().position(|f| f == s).unwrap_or(0))
        .collect();
    idx.iter()
        .map(|&i| idx.iter().map(|&j| cov[i][j]).collect())
        .collect()
}
