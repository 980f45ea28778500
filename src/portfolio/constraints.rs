//! Weight-vector constraints: per-asset bounds, asset-class caps, leverage.

use crate::error::{Error, Result};
use crate::types::{Symbol, Weight};
use std::collections::BTreeMap;

const MAX_PROJECTION_PASSES: usize = 20;
const EPS: f64 = 1e-9;

/// Bounds a portfolio's weight vector must satisfy.
///
/// Asset-class labels are supplied out-of-band (a `Symbol -> class name`
/// map) rather than carried on `Constraints` itself, since the same
/// constraints are typically reused across many rebalances while the
/// universe (and therefore the class membership) changes.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraints {
    pub min_weight: Weight,
    pub max_weight: Weight,
    pub max_per_asset: Weight,
    /// Asset class name -> (min share of portfolio, max share of portfolio).
    pub class_caps: BTreeMap<String, (Weight, Weight)>,
    pub leverage_cap: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            min_weight: 0.0,
            max_weight: 1.0,
            max_per_asset: 1.0,
            class_caps: BTreeMap::new(),
            leverage_cap: 1.0,
        }
    }
}

impl Constraints {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_weight) {
            return Err(Error::invalid_config("min_weight", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.max_weight) {
            return Err(Error::invalid_config("max_weight", "must be in [0, 1]"));
        }
        if self.min_weight > self.max_weight {
            return Err(Error::invalid_config("min_weight", "must not exceed max_weight"));
        }
        if !(0.0..=1.0).contains(&self.max_per_asset) {
            return Err(Error::invalid_config("max_per_asset", "must be in [0, 1]"));
        }
        if !(self.leverage_cap.is_finite() && self.leverage_cap > 0.0) {
            return Err(Error::invalid_config("leverage_cap", "must be a positive finite number"));
        }
        for (class, (min, max)) in &self.class_caps {
            if !(0.0..=1.0).contains(min) || !(0.0..=1.0).contains(max) || min > max {
                return Err(Error::invalid_config(
                    "class_caps",
                    format!("class '{class}' has infeasible bounds ({min}, {max})"),
                ));
            }
        }
        Ok(())
    }

    /// Validate that a fully-formed portfolio (already-projected weights)
    /// satisfies every bound. Unlike [`Self::project`], this never mutates.
    pub fn validate_portfolio(&self, weights: &BTreeMap<Symbol, Weight>, classes: &BTreeMap<Symbol, String>) -> Result<()> {
        let sum: f64 = weights.values().sum();
        if sum > self.leverage_cap + EPS {
            return Err(Error::invalid_config(
                "leverage_cap",
                format!("portfolio weight sum {sum} exceeds leverage cap {}", self.leverage_cap),
            ));
        }
        for (symbol, w) in weights {
            if *w < self.min_weight - EPS || *w > self.max_weight.min(self.max_per_asset) + EPS {
                return Err(Error::invalid_config(
                    "weight_bounds",
                    format!("{symbol} weight {w} outside [{}, {}]", self.min_weight, self.max_weight),
                ));
            }
        }
        let class_sums = sum_by_class(weights, classes);
        for (class, (_, max)) in &self.class_caps {
            let s = class_sums.get(class).copied().unwrap_or(0.0);
            if s > *max + EPS {
                return Err(Error::invalid_config(
                    "class_caps",
                    format!("class '{class}' weight {s} exceeds cap {max}"),
                ));
            }
        }
        Ok(())
    }

    /// Project an arbitrary weight vector onto the feasible set: clip to
    /// per-asset bounds, scale to the leverage cap, then enforce class caps
    /// by sequential scaling (each over-cap class is scaled down to its cap
    /// and the freed mass redistributed proportionally to non-saturated
    /// classes), iterating to a fixed point or [`MAX_PROJECTION_PASSES`]
    /// passes. Raises `InvalidConfig` if still infeasible afterward.
    pub fn project(
        &self,
        weights: &BTreeMap<Symbol, Weight>,
        classes: &BTreeMap<Symbol, String>,
    ) -> Result<BTreeMap<Symbol, Weight>> {
        let per_asset_cap = self.max_weight.min(self.max_per_asset);
        let mut w: BTreeMap<Symbol, Weight> = weights
            .iter()
            .map(|(s, v)| (*s, v.clamp(self.min_weight, per_asset_cap)))
            .collect();

        scale_to_leverage(&mut w, self.leverage_cap);

        if self.class_caps.is_empty() {
            return Ok(w);
        }

        for _ in 0..MAX_PROJECTION_PASSES {
            let class_sums = sum_by_class(&w, classes);
            let mut saturated: Vec<(&String, f64, f64)> = Vec::new();
            for (class, (_, max)) in &self.class_caps {
                let s = class_sums.get(class).copied().unwrap_or(0.0);
                if s > *max + EPS {
                    saturated.push((class, s, *max));
                }
            }
            if saturated.is_empty() {
                break;
            }

            let mut freed = 0.0;
            let saturated_classes: Vec<&String> = saturated.iter().map(|(c, ..)| *c).collect();
            for (class, sum, cap) in &saturated {
                let scale = if *sum > EPS { cap / sum } else { 0.0 };
                for (symbol, v) in w.iter_mut() {
                    if classes.get(symbol).map(|c| c == *class).unwrap_or(false) {
                        *v *= scale;
                    }
                }
                freed += sum - cap;
            }

            let receiver_mass: f64 = w
                .iter()
                .filter(|(s, _)| {
                    classes
                        .get(*s)
                        .map(|c| !saturated_classes.contains(&c))
                        .unwrap_or(true)
                })
                .map(|(_, v)| *v)
                .sum();

            if receiver_mass > EPS {
                for (symbol, v) in w.iter_mut() {
                    let is_receiver = classes
                        .get(symbol)
                        .map(|c| !saturated_classes.contains(&c))
                        .unwrap_or(true);
                    if is_receiver {
                        *v += freed * (*v / receiver_mass);
                    }
                }
            }
        }

        let class_sums = sum_by_class(&w, classes);
        for (class, (_, max)) in &self.class_caps {
            let s = class_sums.get(class).copied().unwrap_or(0.0);
            if s > *max + 1e-6 {
                return Err(Error::invalid_config(
                    "class_caps",
                    format!("class '{class}' still at {s} after {MAX_PROJECTION_PASSES} projection passes, cap is {max}"),
                ));
            }
        }

        Ok(w)
    }
}

fn scale_to_leverage(w: &mut BTreeMap<Symbol, Weight>, leverage_cap: f64) {
    let sum: f64 = w.values().sum();
    if sum > leverage_cap + EPS && sum > EPS {
        let scale = leverage_cap / sum;
        for v in w.values_mut() {
            *v *= scale;
        }
    }
}

fn sum_by_class(w: &BTreeMap<Symbol, Weight>, classes: &BTreeMap<Symbol, String>) -> BTreeMap<String, f64> {
    let mut sums = BTreeMap::new();
    for (symbol, v) in w {
        if let Some(class) = classes.get(symbol) {
            *sums.entry(class.clone()).or_insert(0.0) += v;
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn default_is_permissive() {
        let c = Constraints::default();
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_min_greater_than_max() {
        let c = Constraints {
            min_weight: 0.5,
            max_weight: 0.2,
            ..Constraints::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn clips_to_per_asset_bounds() {
        let c = Constraints {
            max_per_asset: 0.4,
            ..Constraints::default()
        };
        let weights: BTreeMap<Symbol, f64> = [(sym("A"), 0.9), (sym("B"), 0.1)].into_iter().collect();
        let classes = BTreeMap::new();
        let projected = c.project(&weights, &classes).unwrap();
        assert!(projected[&sym("A")] <= 0.4 + 1e-9);
    }

    #[test]
    fn scales_down_to_leverage_cap() {
        let c = Constraints {
            leverage_cap: 1.0,
            ..Constraints::default()
        };
        let weights: BTreeMap<Symbol, f64> = [(sym("A"), 0.8), (sym("B"), 0.8)].into_iter().collect();
        let classes = BTreeMap::new();
        let projected = c.project(&weights, &classes).unwrap();
        let sum: f64 = projected.values().sum();
        assert!(sum <= 1.0 + 1e-9);
    }

    #[test]
    fn enforces_class_cap_and_redistributes() {
        let mut class_caps = BTreeMap::new();
        class_caps.insert("tech".to_owned(), (0.0, 0.5));
        let c = Constraints {
            class_caps,
            ..Constraints::default()
        };
        let weights: BTreeMap<Symbol, f64> = [(sym("A"), 0.4), (sym("B"), 0.4), (sym("C"), 0.2)]
            .into_iter()
            .collect();
        let classes: BTreeMap<Symbol, String> = [
            (sym("A"), "tech".to_owned()),
            (sym("B"), "tech".to_owned()),
            (sym("C"), "other".to_owned()),
        ]
        .into_iter()
        .collect();
        let projected = c.project(&weights, &classes).unwrap();
        let tech_sum = projected[&sym("A")] + projected[&sym("B")];
        assert!(tech_sum <= 0.5 + 1e-6, "tech_sum={tech_sum}");
        // freed mass should have flowed to C
        assert!(projected[&sym("C")] > 0.2);
    }

    #[test]
    fn validate_portfolio_flags_cap_violation() {
        let c = Constraints {
            max_per_asset: 0.3,
            ..Constraints::default()
        };
        let weights: BTreeMap<Symbol, f64> = [(sym("A"), 0.5)].into_iter().collect();
        assert!(c.validate_portfolio(&weights, &BTreeMap::new()).is_err());
    }
}
