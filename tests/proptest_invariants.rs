//! Property-based tests for portfolio invariants.
//!
//! These tests use proptest to verify that key invariants hold across
//! randomly generated scenarios, complementing the literal-scenario and
//! property tests in `portfolio_invariants.rs`.

use nanofolio::portfolio::Constraints;
use nanofolio::types::Symbol;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn symbols_strategy(n: usize) -> Vec<Symbol> {
    (0..n).map(|i| Symbol::new(&format!("S{i:03}"))).collect()
}

fn weight_strategy() -> impl Strategy<Value = f64> {
    0.0f64..=2.0
}

fn leverage_cap_strategy() -> impl Strategy<Value = f64> {
    0.1f64..=1.5
}

fn max_per_asset_strategy() -> impl Strategy<Value = f64> {
    0.05f64..=1.0
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // CONSTRAINT PROJECTION INVARIANTS
    // ========================================================================

    /// Projection is idempotent: projecting an already-feasible vector is a
    /// no-op up to float tolerance.
    #[test]
    fn projection_is_idempotent(
        raw_weights in prop::collection::vec(weight_strategy(), 1..8),
        leverage_cap in leverage_cap_strategy(),
        max_per_asset in max_per_asset_strategy(),
    ) {
        let symbols = symbols_strategy(raw_weights.len());
        let raw: BTreeMap<Symbol, f64> = symbols.iter().copied().zip(raw_weights).collect();
        let constraints = Constraints {
            max_per_asset,
            leverage_cap,
            ..Constraints::default()
        };
        let classes = BTreeMap::new();

        let once = constraints.project(&raw, &classes).unwrap();
        let twice = constraints.project(&once, &classes).unwrap();

        for symbol in once.keys() {
            prop_assert!(
                (once[symbol] - twice[symbol]).abs() < 1e-9,
                "projection not idempotent for {symbol}: {} vs {}",
                once[symbol], twice[symbol]
            );
        }
    }

    /// A projected weight vector always satisfies its own bounds: every
    /// weight is finite, non-negative, at most `max_per_asset`, and the sum
    /// never exceeds `leverage_cap` (plus a small float tolerance).
    #[test]
    fn projection_satisfies_bounds(
        raw_weights in prop::collection::vec(weight_strategy(), 1..8),
        leverage_cap in leverage_cap_strategy(),
        max_per_asset in max_per_asset_strategy(),
    ) {
        let symbols = symbols_strategy(raw_weights.len());
        let raw: BTreeMap<Symbol, f64> = symbols.iter().copied().zip(raw_weights).collect();
        let constraints = Constraints {
            max_per_asset,
            leverage_cap,
            ..Constraints::default()
        };
        let classes = BTreeMap::new();

        let projected = constraints.project(&raw, &classes).unwrap();

        let sum: f64 = projected.values().sum();
        prop_assert!(sum <= leverage_cap + 1e-6, "sum {sum} exceeds leverage_cap {leverage_cap}");
        for (symbol, &w) in &projected {
            prop_assert!(w.is_finite(), "{symbol} has non-finite weight");
            prop_assert!(w >= -1e-9, "{symbol} has negative weight {w}");
            prop_assert!(w <= max_per_asset + 1e-9, "{symbol} weight {w} exceeds max_per_asset {max_per_asset}");
        }
    }

    /// Class caps are respected after projection: no class's weight sum
    /// exceeds its configured cap.
    #[test]
    fn class_caps_are_respected(
        raw_weights in prop::collection::vec(weight_strategy(), 2..6),
        class_cap in 0.1f64..0.9,
    ) {
        let symbols = symbols_strategy(raw_weights.len());
        let raw: BTreeMap<Symbol, f64> = symbols.iter().copied().zip(raw_weights).collect();
        let classes: BTreeMap<Symbol, String> = symbols.iter().map(|s| (*s, "tech".to_string())).collect();

        let mut constraints = Constraints::default();
        constraints.class_caps.insert("tech".to_string(), (0.0, class_cap));
        let projected = constraints.project(&raw, &classes).unwrap();

        let tech_sum: f64 = projected.values().sum();
        prop_assert!(tech_sum <= class_cap + 1e-6, "tech class sum {tech_sum} exceeds cap {class_cap}");
    }
}
