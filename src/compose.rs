//! # Proxy Abstraction and Composition
//!
//! Trait and implementations for scoring proxies.
//!
//! ## Overview
//!
//! A proxy scores a batch of candidate samples. The composition layer
//! combines several named proxies into one:
//!
//! - [`Proxy`] - core trait for batch scoring
//! - [`ComposedProxy`] - weighted aggregate of named sub-proxies
//! - [`MockProxy`] - test proxy with configurable scores
//!
//! ## Aggregation
//!
//! Aggregation modes are a named-strategy lookup:
//!
//! | Name | Meaning |
//! |--------|----------------------------------|
//! | `sum` | Σ weightᵢ · scoreᵢ |
//! | `mean` | Σ weightᵢ · scoreᵢ / Σ weightᵢ |
//! | `max` | max(weightᵢ · scoreᵢ) |
//!
//! An unknown name fails with `WEFT-051` at construction time.

use crate::error::WeftError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A scoring function over a batch of samples
pub trait Proxy: Send + Sync {
    fn name(&self) -> &str;

    /// Score every sample in the batch; output length equals input length
    fn score_batch(&self, batch: &[f64]) -> Vec<f64>;

    /// Whether larger scores are better (rewards flip the sign otherwise)
    fn higher_is_better(&self) -> bool {
        true
    }

    /// Whether scores are guaranteed >= 0 (required for linear boosting)
    fn is_non_negative(&self) -> bool {
        false
    }
}

/// How a composed proxy combines its weighted component scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
    Max,
}

pub const AGGREGATION_NAMES: &[&str] = &["sum", "mean", "max"];

impl Aggregation {
    pub fn from_name(name: &str) -> Result<Self, WeftError> {
        match name {
            "sum" => Ok(Aggregation::Sum),
            "mean" => Ok(Aggregation::Mean),
            "max" => Ok(Aggregation::Max),
            other => Err(WeftError::UnknownAggregation {
                name: other.to_string(),
                known: AGGREGATION_NAMES.join(", "),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Max => "max",
        }
    }

    fn combine(&self, weighted: &[f64], total_weight: f64) -> f64 {
        match self {
            Aggregation::Sum => weighted.iter().sum(),
            Aggregation::Mean => {
                let sum: f64 = weighted.iter().sum();
                sum / total_weight
            }
            Aggregation::Max => weighted.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Weighted aggregate of named sub-proxies
///
/// Invariant: the proxy and weight maps have identical, non-empty key sets,
/// and every component agrees on score direction.
pub struct ComposedProxy {
    /// (name, proxy, weight), sorted by name for deterministic evaluation
    components: Vec<(String, Arc<dyn Proxy>, f64)>,
    aggregation: Aggregation,
    higher_is_better: bool,
    non_negative: bool,
}

impl ComposedProxy {
    pub fn new(
        proxies: BTreeMap<String, Arc<dyn Proxy>>,
        weights: BTreeMap<String, f64>,
        aggregation: Aggregation,
    ) -> Result<Self, WeftError> {
        if let Some(detail) = key_set_mismatch(
            proxies.keys().map(|k| k.as_str()),
            weights.keys().map(|k| k.as_str()),
        ) {
            return Err(WeftError::KeySetMismatch { detail });
        }
        if proxies.is_empty() {
            return Err(WeftError::InvalidParameter {
                class: "ComposedProxy".to_string(),
                param: "proxies_dict".to_string(),
                reason: "at least one component is required".to_string(),
            });
        }

        let higher_is_better = proxies.values().next().expect("non-empty").higher_is_better();
        if proxies.values().any(|p| p.higher_is_better() != higher_is_better) {
            return Err(WeftError::InvalidParameter {
                class: "ComposedProxy".to_string(),
                param: "proxies_dict".to_string(),
                reason: "components disagree on score direction".to_string(),
            });
        }

        let non_negative = proxies.values().all(|p| p.is_non_negative())
            && weights.values().all(|w| *w >= 0.0);

        let mut components = Vec::with_capacity(proxies.len());
        for (name, proxy) in proxies {
            let weight = weights[&name];
            components.push((name, proxy, weight));
        }
        Ok(Self {
            components,
            aggregation,
            higher_is_better,
            non_negative,
        })
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    /// Raw (unweighted) per-component scores, keyed by component name.
    /// Exposed so metrics can report each component alongside the aggregate.
    pub fn component_scores(&self, batch: &[f64]) -> BTreeMap<String, Vec<f64>> {
        self.components
            .iter()
            .map(|(name, proxy, _)| (name.clone(), proxy.score_batch(batch)))
            .collect()
    }
}

impl Proxy for ComposedProxy {
    fn name(&self) -> &str {
        "ComposedProxy"
    }

    fn score_batch(&self, batch: &[f64]) -> Vec<f64> {
        let total_weight: f64 = self.components.iter().map(|(_, _, w)| w).sum();
        let per_component: Vec<(f64, Vec<f64>)> = self
            .components
            .iter()
            .map(|(_, proxy, weight)| (*weight, proxy.score_batch(batch)))
            .collect();

        (0..batch.len())
            .map(|i| {
                let weighted: Vec<f64> = per_component
                    .iter()
                    .map(|(weight, scores)| weight * scores[i])
                    .collect();
                self.aggregation.combine(&weighted, total_weight)
            })
            .collect()
    }

    fn higher_is_better(&self) -> bool {
        self.higher_is_better
    }

    fn is_non_negative(&self) -> bool {
        self.non_negative
    }
}

/// Describe how two key sets differ, or None if they match
pub fn key_set_mismatch<'a>(
    proxies: impl Iterator<Item = &'a str>,
    weights: impl Iterator<Item = &'a str>,
) -> Option<String> {
    let proxies: std::collections::BTreeSet<&str> = proxies.collect();
    let weights: std::collections::BTreeSet<&str> = weights.collect();
    if proxies == weights {
        return None;
    }
    let mut parts = Vec::new();
    let only_proxies: Vec<&str> = proxies.difference(&weights).copied().collect();
    let only_weights: Vec<&str> = weights.difference(&proxies).copied().collect();
    if !only_proxies.is_empty() {
        parts.push(format!("weight_dict missing: {}", only_proxies.join(", ")));
    }
    if !only_weights.is_empty() {
        parts.push(format!("proxies_dict missing: {}", only_weights.join(", ")));
    }
    Some(parts.join("; "))
}

/// Deterministic proxy for tests: cycles through a fixed score list
pub struct MockProxy {
    scores: Vec<f64>,
    higher_is_better: bool,
    non_negative: bool,
}

impl MockProxy {
    pub fn new(scores: Vec<f64>, higher_is_better: bool, non_negative: bool) -> Self {
        let scores = if scores.is_empty() { vec![0.5] } else { scores };
        Self {
            scores,
            higher_is_better,
            non_negative,
        }
    }
}

impl Default for MockProxy {
    fn default() -> Self {
        Self::new(vec![0.5], true, true)
    }
}

impl Proxy for MockProxy {
    fn name(&self) -> &str {
        "MockProxy"
    }

    fn score_batch(&self, batch: &[f64]) -> Vec<f64> {
        batch
            .iter()
            .enumerate()
            .map(|(i, _)| self.scores[i % self.scores.len()])
            .collect()
    }

    fn higher_is_better(&self) -> bool {
        self.higher_is_better
    }

    fn is_non_negative(&self) -> bool {
        self.non_negative
    }
}
