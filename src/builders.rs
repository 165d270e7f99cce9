//! # Constructor Factory Table
//!
//! String-keyed dispatch from class names to builder functions.
//!
//! ## Overview
//!
//! Every class a document can reference with `@Class()` is registered here
//! as a [`ConstructorSpec`]: the declared parameter names (required or
//! optional), an optional raw-value pre-validation hook, and the builder
//! itself. The binder checks bindings against the declared signature
//! before resolving anything, so typos and missing parameters surface with
//! the offending key rather than from inside a half-built object.
//!
//! ## Built-in constructors
//!
//! | Class | Produces |
//! |--------------------|------------------|
//! | `Trainer` | trainer |
//! | `Reward` | reward |
//! | `ComposedProxy` | proxy |
//! | `MockProxy` | proxy |
//! | `TrajectoryBalance`| objective |
//! | `ReplayBuffer` | replay buffer |
//! | `MetricsCollector` | metrics collector|
//! | `RunLogger` | logger |
//!
//! Embedding callers may register additional constructors with
//! [`FactoryTable::register`].

use crate::binder::{BoundArgs, RawArgs};
use crate::components::Component;
use crate::compose::{key_set_mismatch, Aggregation, ComposedProxy, MockProxy, Proxy};
use crate::error::WeftError;
use crate::reward::{Reward, RewardBoosting};
use crate::trainer::{
    LogBackend, MetricsCollector, Prioritization, ReplayBuffer, RunLogger, Trainer,
    TrajectoryBalance,
};
use crate::value::is_identifier;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One declared constructor parameter
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn req(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: true,
    }
}

const fn opt(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        required: false,
    }
}

/// A registered constructor: declared signature + builder
pub struct ConstructorSpec {
    pub name: &'static str,
    pub params: &'static [ParamSpec],
    /// Runs on the raw bindings before any value resolution, so failures
    /// here precede all construction side effects
    pub prevalidate: Option<fn(&RawArgs) -> Result<(), WeftError>>,
    pub build: fn(&BoundArgs) -> Result<Component, WeftError>,
}

impl ConstructorSpec {
    pub fn declares(&self, param: &str) -> bool {
        self.params.iter().any(|p| p.name == param)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
    }
}

/// Name -> constructor dispatch table
#[derive(Default)]
pub struct FactoryTable {
    specs: BTreeMap<&'static str, ConstructorSpec>,
}

impl FactoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with all built-in constructors registered
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(ConstructorSpec {
            name: "MockProxy",
            params: const { &[opt("scores"), opt("higher_is_better"), opt("non_negative")] },
            prevalidate: None,
            build: build_mock_proxy,
        });
        table.register(ConstructorSpec {
            name: "ComposedProxy",
            params: const { &[req("proxies_dict"), req("weight_dict"), opt("aggregation")] },
            prevalidate: Some(prevalidate_composed_proxy),
            build: build_composed_proxy,
        });
        table.register(ConstructorSpec {
            name: "Reward",
            params: const {
                &[
                    req("proxy"),
                    opt("reward_boosting"),
                    opt("min_reward"),
                    opt("beta"),
                ]
            },
            prevalidate: None,
            build: build_reward,
        });
        table.register(ConstructorSpec {
            name: "TrajectoryBalance",
            params: const { &[opt("z_init")] },
            prevalidate: None,
            build: build_trajectory_balance,
        });
        table.register(ConstructorSpec {
            name: "ReplayBuffer",
            params: const { &[opt("capacity"), opt("prioritization")] },
            prevalidate: None,
            build: build_replay_buffer,
        });
        table.register(ConstructorSpec {
            name: "MetricsCollector",
            params: const { &[opt("metrics")] },
            prevalidate: None,
            build: build_metrics_collector,
        });
        table.register(ConstructorSpec {
            name: "RunLogger",
            params: const { &[opt("backend"), opt("log_dir")] },
            prevalidate: None,
            build: build_run_logger,
        });
        table.register(ConstructorSpec {
            name: "Trainer",
            params: const {
                &[
                    req("objective"),
                    req("reward"),
                    opt("run_dir"),
                    opt("n_iterations"),
                    opt("replay_buffer"),
                    opt("metrics"),
                    opt("logger"),
                ]
            },
            prevalidate: None,
            build: build_trainer,
        });
        table
    }

    pub fn register(&mut self, spec: ConstructorSpec) {
        debug_assert!(
            spec.name.split('.').all(is_identifier),
            "constructor name '{}' is not a dotted identifier",
            spec.name
        );
        self.specs.insert(spec.name, spec);
    }

    pub fn get(&self, name: &str) -> Option<&ConstructorSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.keys().copied()
    }

    /// Near-miss suggestions for an unknown constructor name
    pub fn suggest(&self, name: &str) -> Vec<String> {
        let lower = name.to_lowercase();
        let mut scored: Vec<(usize, &str)> = self
            .specs
            .keys()
            .filter_map(|candidate| {
                let distance = edit_distance(&lower, &candidate.to_lowercase());
                (distance <= 2).then_some((distance, *candidate))
            })
            .collect();
        scored.sort();
        scored
            .into_iter()
            .take(2)
            .map(|(_, candidate)| candidate.to_string())
            .collect()
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

// ─────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────

fn expect_kind<'a, T>(
    args: &BoundArgs,
    param: &str,
    component: &'a Component,
    expected: &'static str,
    extract: impl Fn(&'a Component) -> Option<&'a T>,
) -> Result<&'a T, WeftError> {
    extract(component).ok_or_else(|| WeftError::ParameterType {
        class: args.class().to_string(),
        param: param.to_string(),
        expected,
        found: component.kind().to_string(),
    })
}

fn build_mock_proxy(args: &BoundArgs) -> Result<Component, WeftError> {
    let scores = args.get_f64_list("scores")?.unwrap_or_else(|| vec![0.5]);
    let higher_is_better = args.get_bool("higher_is_better")?.unwrap_or(true);
    let non_negative = args.get_bool("non_negative")?.unwrap_or(true);
    Ok(Component::Proxy(Arc::new(MockProxy::new(
        scores,
        higher_is_better,
        non_negative,
    ))))
}

/// Key-set equality is checked on the raw dict literals, before any
/// sub-proxy is constructed.
fn prevalidate_composed_proxy(raw: &RawArgs) -> Result<(), WeftError> {
    let (Some(proxies), Some(weights)) =
        (raw.dict_keys("proxies_dict"), raw.dict_keys("weight_dict"))
    else {
        // Bound through %refs or non-dict values: the constructor itself
        // re-checks once the values are resolved.
        return Ok(());
    };
    match key_set_mismatch(proxies.into_iter(), weights.into_iter()) {
        Some(detail) => Err(WeftError::KeySetMismatch { detail }),
        None => Ok(()),
    }
}

fn build_composed_proxy(args: &BoundArgs) -> Result<Component, WeftError> {
    let objects = args.require_object_dict("proxies_dict")?;
    let mut proxies: BTreeMap<String, Arc<dyn Proxy>> = BTreeMap::new();
    for (name, component) in &objects {
        let proxy =
            expect_kind(args, "proxies_dict", component, "dict of proxies", |c| {
                c.as_proxy()
            })?;
        proxies.insert(name.clone(), Arc::clone(proxy));
    }
    let weights = args.require_f64_dict("weight_dict")?;
    let aggregation = Aggregation::from_name(args.get_str("aggregation")?.unwrap_or("sum"))?;
    Ok(Component::Proxy(Arc::new(ComposedProxy::new(
        proxies,
        weights,
        aggregation,
    )?)))
}

fn build_reward(args: &BoundArgs) -> Result<Component, WeftError> {
    let component = args.require_object("proxy")?;
    let proxy = expect_kind(args, "proxy", component, "proxy", |c| c.as_proxy())?;
    let boosting = RewardBoosting::from_name(args.get_str("reward_boosting")?.unwrap_or("linear"))?;
    let min_reward = args.get_f64("min_reward")?.unwrap_or(0.0);
    let beta = args.get_f64("beta")?.unwrap_or(1.0);
    Ok(Component::Reward(Arc::new(Reward::new(
        Arc::clone(proxy),
        boosting,
        min_reward,
        beta,
    )?)))
}

fn build_trajectory_balance(args: &BoundArgs) -> Result<Component, WeftError> {
    let z_init = args.get_f64("z_init")?.unwrap_or(0.0);
    Ok(Component::Objective(Arc::new(TrajectoryBalance::new(
        z_init,
    ))))
}

fn build_replay_buffer(args: &BoundArgs) -> Result<Component, WeftError> {
    let capacity = args.get_i64("capacity")?.unwrap_or(1000);
    let prioritization =
        Prioritization::from_name(args.get_str("prioritization")?.unwrap_or("uniform"))?;
    Ok(Component::ReplayBuffer(Arc::new(ReplayBuffer::new(
        capacity,
        prioritization,
    )?)))
}

fn build_metrics_collector(args: &BoundArgs) -> Result<Component, WeftError> {
    let metrics = args.get_str_list("metrics")?.unwrap_or_default();
    Ok(Component::Metrics(Arc::new(MetricsCollector { metrics })))
}

fn build_run_logger(args: &BoundArgs) -> Result<Component, WeftError> {
    let backend = LogBackend::from_name(args.get_str("backend")?.unwrap_or("console"))?;
    let log_dir = args.get_str("log_dir")?.map(str::to_string);
    Ok(Component::Logger(Arc::new(RunLogger::new(
        backend, log_dir,
    )?)))
}

fn build_trainer(args: &BoundArgs) -> Result<Component, WeftError> {
    let objective = expect_kind(
        args,
        "objective",
        args.require_object("objective")?,
        "objective",
        |c| c.as_objective(),
    )?;
    let reward = expect_kind(args, "reward", args.require_object("reward")?, "reward", |c| {
        c.as_reward()
    })?;

    let run_dir = args.get_str("run_dir")?.unwrap_or("runs").to_string();
    let n_iterations = args.get_i64("n_iterations")?.unwrap_or(1000);
    if n_iterations <= 0 {
        return Err(WeftError::InvalidParameter {
            class: "Trainer".to_string(),
            param: "n_iterations".to_string(),
            reason: format!("must be positive, got {}", n_iterations),
        });
    }

    let replay_buffer = match args.get_object("replay_buffer")? {
        Some(component) => Some(Arc::clone(expect_kind(
            args,
            "replay_buffer",
            component,
            "replay buffer",
            |c| c.as_replay_buffer(),
        )?)),
        None => None,
    };
    let metrics = match args.get_object("metrics")? {
        Some(component) => Some(Arc::clone(expect_kind(
            args,
            "metrics",
            component,
            "metrics collector",
            |c| c.as_metrics(),
        )?)),
        None => None,
    };
    let logger = match args.get_object("logger")? {
        Some(component) => Some(Arc::clone(expect_kind(
            args,
            "logger",
            component,
            "logger",
            |c| c.as_logger(),
        )?)),
        None => None,
    };

    Ok(Component::Trainer(Arc::new(Trainer {
        objective: Arc::clone(objective),
        reward: Arc::clone(reward),
        run_dir,
        n_iterations,
        replay_buffer,
        metrics,
        logger,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::Resolved;

    fn args(class: &str, entries: Vec<(&str, Resolved)>) -> BoundArgs {
        let values = entries
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        BoundArgs::new(class, values)
    }

    #[test]
    fn builtins_registered() {
        let table = FactoryTable::with_builtins();
        for name in [
            "Trainer",
            "Reward",
            "ComposedProxy",
            "MockProxy",
            "TrajectoryBalance",
            "ReplayBuffer",
            "MetricsCollector",
            "RunLogger",
        ] {
            assert!(table.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn declared_params() {
        let table = FactoryTable::with_builtins();
        let trainer = table.get("Trainer").unwrap();
        assert!(trainer.declares("objective"));
        assert!(!trainer.declares("objectives"));
        assert_eq!(
            trainer.required_params().collect::<Vec<_>>(),
            vec!["objective", "reward"]
        );
    }

    #[test]
    fn suggestions_rank_by_distance() {
        let table = FactoryTable::with_builtins();
        assert_eq!(table.suggest("MokProxy"), vec!["MockProxy".to_string()]);
        assert_eq!(table.suggest("reward"), vec!["Reward".to_string()]);
        assert!(table.suggest("SomethingElseEntirely").is_empty());
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("abc", "abc"), 0);
        assert_eq!(edit_distance("abc", "abd"), 1);
        assert_eq!(edit_distance("abc", "ab"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn mock_proxy_defaults() {
        let component = build_mock_proxy(&args("MockProxy", vec![])).unwrap();
        let proxy = component.as_proxy().unwrap();
        assert_eq!(proxy.score_batch(&[0.0]), vec![0.5]);
        assert!(proxy.is_non_negative());
    }

    #[test]
    fn reward_builder_rejects_wrong_kind() {
        let objective = Component::Objective(Arc::new(TrajectoryBalance::new(0.0)));
        let err = build_reward(&args("Reward", vec![("proxy", Resolved::Object(objective))]))
            .unwrap_err();
        match err {
            WeftError::ParameterType { expected, found, .. } => {
                assert_eq!(expected, "proxy");
                assert_eq!(found, "objective");
            }
            other => panic!("expected ParameterType, got {:?}", other),
        }
    }

    #[test]
    fn trainer_builder_requires_positive_iterations() {
        let objective = Component::Objective(Arc::new(TrajectoryBalance::new(0.0)));
        let reward_component = build_reward(&args(
            "Reward",
            vec![(
                "proxy",
                Resolved::Object(build_mock_proxy(&args("MockProxy", vec![])).unwrap()),
            )],
        ))
        .unwrap();
        let err = build_trainer(&args(
            "Trainer",
            vec![
                ("objective", Resolved::Object(objective)),
                ("reward", Resolved::Object(reward_component)),
                ("n_iterations", Resolved::Int(0)),
            ],
        ))
        .unwrap_err();
        assert!(matches!(err, WeftError::InvalidParameter { .. }));
    }

    #[test]
    fn prevalidate_skips_non_dict_bindings() {
        let raw = RawArgs {
            class: "ComposedProxy".to_string(),
            values: BTreeMap::new(),
        };
        assert!(prevalidate_composed_proxy(&raw).is_ok());
    }
}
