//! Membership Policy: smooths top-K membership across successive rebalances
//! via a rank buffer, a minimum holding period, and a maximum per-rebalance
//! turnover. Deterministic: every tie break falls back to symbol
//! lexicographic order.

use crate::error::{Error, Result};
use crate::types::Symbol;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct MembershipConfig {
    pub enabled: bool,
    pub buffer_rank: usize,
    pub min_holding_periods: u32,
    pub max_turnover: f64,
}

impl MembershipConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.max_turnover) {
            return Err(Error::invalid_config("max_turnover", "must be in [0, 1]"));
        }
        Ok(())
    }
}

/// Carries forward state across rebalances: which symbols are currently
/// members, and for how many consecutive rebalances each has held on.
#[derive(Clone, Debug, Default)]
pub struct MembershipState {
    pub current_members: Vec<Symbol>,
    pub holding_counts: BTreeMap<Symbol, u32>,
}

pub struct MembershipPolicy {
    config: MembershipConfig,
}

impl MembershipPolicy {
    pub fn new(config: MembershipConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Rank positions beyond `top_k` a current member can fall into and
    /// still count as "inside the buffer". Callers that rank a universe
    /// before calling [`Self::apply`] must rank at least `top_k +
    /// buffer_rank` deep, or retention can never see the buffer zone.
    pub fn buffer_rank(&self) -> usize {
        self.config.buffer_rank
    }

    /// Apply the policy to a freshly ranked list (best first), producing the
    /// new member set and updating `state` in place.
    ///
    /// If the policy is disabled, membership simply tracks `ranked_list`'s
    /// top `top_k` verbatim (no smoothing).
    pub fn apply(&self, ranked_list: &[Symbol], top_k: usize, state: &mut MembershipState) -> Vec<Symbol> {
        let inside: Vec<Symbol> = ranked_list.iter().take(top_k).copied().collect();

        if !self.config.enabled {
            state.current_members = inside.clone();
            state.holding_counts = inside.iter().map(|s| (*s, 1)).collect();
            return inside;
        }

        let buffer: Vec<Symbol> = ranked_list
            .iter()
            .skip(top_k)
            .take(self.config.buffer_rank)
            .copied()
            .collect();
        let inside_or_buffer: Vec<Symbol> = inside.iter().chain(buffer.iter()).copied().collect();

        let rank_of = |s: Symbol| -> usize {
            ranked_list
                .iter()
                .position(|r| *r == s)
                .unwrap_or(usize::MAX)
        };

        if state.current_members.is_empty() {
            state.current_members = inside.clone();
            state.holding_counts = inside.iter().map(|s| (*s, 1)).collect();
            return inside;
        }

        let prev_members = state.current_members.clone();

        // Retain: still inside/buffer, or hasn't met its minimum holding period yet.
        let mut retained: Vec<Symbol> = prev_members
            .iter()
            .filter(|s| {
                inside_or_buffer.contains(s)
                    || state.holding_counts.get(s).copied().unwrap_or(0) < self.config.min_holding_periods
            })
            .copied()
            .collect();

        // Admit, in rank order, until the member set reaches top_k.
        let mut admitted: Vec<Symbol> = Vec::new();
        for s in &inside {
            if retained.len() + admitted.len() >= top_k {
                break;
            }
            if !retained.contains(s) {
                admitted.push(*s);
            }
        }

        let mut members: Vec<Symbol> = retained.clone();
        members.extend(admitted.iter().copied());

        let mut removed: Vec<Symbol> = prev_members
            .iter()
            .filter(|s| !members.contains(s))
            .copied()
            .collect();

        // Turnover cap: restore best-ranked removed members (those who fell
        // the least) and symmetrically evict the worst-ranked newly-admitted
        // members, until the turnover ratio is within bounds.
        let prev_n = prev_members.len().max(1) as f64;
        while (removed.len() as f64 / prev_n) > self.config.max_turnover && !removed.is_empty() {
            removed.sort_by_key(|s| (rank_of(*s), *s));
            let restore = removed.remove(0);
            members.push(restore);
            retained.push(restore);

            if let Some(worst) = admitted.pop() {
                members.retain(|s| *s != worst);
            } else {
                break;
            }
        }

        members.sort();
        members.dedup();

        let mut new_counts = BTreeMap::new();
        for s in &members {
            let was_prev = prev_members.contains(s);
            let prev_count = state.holding_counts.get(s).copied().unwrap_or(0);
            new_counts.insert(*s, if was_prev { prev_count + 1 } else { 1 });
        }

        state.current_members = members.clone();
        state.holding_counts = new_counts;
        members
    }
}
