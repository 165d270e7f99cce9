//! Resolver integration tests
//!
//! End-to-end wiring through the public API: load a document, construct
//! the object graph, and check the configuration laws (override order,
//! singleton identity, cycle detection, pre-construction validation).

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft::{
    Component, ConfigSet, ConstructorSpec, FactoryTable, MockProxy, Resolver, WeftError,
};

// ============================================================================
// TEST HELPERS
// ============================================================================

const DEMO_CONFIG: &str = "\
run_dir = 'runs/demo'
unused_macro = 42

Trainer.run_dir = %run_dir
Trainer.n_iterations = 100
Trainer.objective = @TrajectoryBalance()
Trainer.reward = @Reward()
Trainer.replay_buffer = @ReplayBuffer()
Trainer.metrics = @MetricsCollector()

Reward.proxy = @ComposedProxy()
Reward.reward_boosting = 'exponential'
Reward.beta = 2.0

ComposedProxy.proxies_dict = {'target': @target/MockProxy(), 'novelty': @novelty/MockProxy()}
ComposedProxy.weight_dict = {'target': 1.0, 'novelty': 1.0}
ComposedProxy.aggregation = 'sum'

target/MockProxy.scores = [1.0, 2.0]
novelty/MockProxy.scores = [10.0, 20.0]

ReplayBuffer.capacity = 256
MetricsCollector.metrics = ['reward_mean']
";

fn demo_resolver() -> Resolver {
    Resolver::new(ConfigSet::from_document(DEMO_CONFIG, "demo.gin").unwrap())
}

static COUNT_ONCE: AtomicUsize = AtomicUsize::new(0);
static COUNT_MISMATCH: AtomicUsize = AtomicUsize::new(0);

fn build_counting_once(_args: &weft::BoundArgs) -> Result<Component, WeftError> {
    COUNT_ONCE.fetch_add(1, Ordering::SeqCst);
    Ok(Component::Proxy(Arc::new(MockProxy::default())))
}

fn build_counting_mismatch(_args: &weft::BoundArgs) -> Result<Component, WeftError> {
    COUNT_MISMATCH.fetch_add(1, Ordering::SeqCst);
    Ok(Component::Proxy(Arc::new(MockProxy::default())))
}

fn table_with(name: &'static str, build: fn(&weft::BoundArgs) -> Result<Component, WeftError>) -> FactoryTable {
    let mut table = FactoryTable::with_builtins();
    table.register(ConstructorSpec {
        name,
        params: &[],
        prevalidate: None,
        build,
    });
    table
}

// ============================================================================
// END-TO-END WIRING
// ============================================================================

#[test]
fn trainer_wires_end_to_end() {
    let resolver = demo_resolver();
    let component = resolver.construct("Trainer", None).unwrap();
    let trainer = component.as_trainer().unwrap();

    assert_eq!(trainer.run_dir, "runs/demo");
    assert_eq!(trainer.n_iterations, 100);
    assert_eq!(trainer.replay_buffer.as_ref().unwrap().capacity, 256);
    assert_eq!(
        trainer.metrics.as_ref().unwrap().metrics,
        vec!["reward_mean".to_string()]
    );

    // Composed sum with unit weights is the elementwise sum of components;
    // exponential boosting with beta=2 doubles the log-reward.
    let output = trainer.reward.compute(&[0.0, 0.0]);
    assert_eq!(output.proxy, vec![11.0, 22.0]);
    assert_eq!(output.log_reward, vec![22.0, 44.0]);
}

#[test]
fn composed_proxy_sums_components() {
    let resolver = demo_resolver();
    let component = resolver.construct("ComposedProxy", None).unwrap();
    let proxy = component.as_proxy().unwrap();
    assert_eq!(proxy.score_batch(&[0.0, 0.0]), vec![11.0, 22.0]);
}

// ============================================================================
// SINGLETON LAWS
// ============================================================================

#[test]
fn resolving_twice_returns_identical_instance() {
    let resolver = demo_resolver();
    let first = resolver.construct("Reward", None).unwrap();
    let second = resolver.construct("Reward", None).unwrap();
    assert!(first.ptr_eq(&second));
}

#[test]
fn shared_call_sites_share_the_instance() {
    let resolver = demo_resolver();
    let trainer = resolver.construct("Trainer", None).unwrap();
    let composed = resolver.construct("ComposedProxy", None).unwrap();
    let reward_proxy = trainer.as_trainer().unwrap().reward.proxy();
    assert!(Arc::ptr_eq(reward_proxy, composed.as_proxy().unwrap()));
}

#[test]
fn constructor_runs_exactly_once() {
    let config = ConfigSet::from_document("x = 1\n", "t.gin").unwrap();
    let resolver = Resolver::with_factories(config, table_with("OnceProxy", build_counting_once));

    let first = resolver.construct("OnceProxy", None).unwrap();
    let second = resolver.construct("OnceProxy", None).unwrap();

    assert_eq!(COUNT_ONCE.load(Ordering::SeqCst), 1);
    assert!(first.ptr_eq(&second));
}

#[test]
fn scoped_calls_are_distinct_singletons() {
    let resolver = demo_resolver();
    let target = resolver.construct("MockProxy", Some("target")).unwrap();
    let novelty = resolver.construct("MockProxy", Some("novelty")).unwrap();
    assert!(!target.ptr_eq(&novelty));
    assert_eq!(target.as_proxy().unwrap().score_batch(&[0.0]), vec![1.0]);
    assert_eq!(novelty.as_proxy().unwrap().score_batch(&[0.0]), vec![10.0]);
}

// ============================================================================
// ERROR LAWS
// ============================================================================

#[test]
fn reference_cycle_fails_without_looping() {
    let config = ConfigSet::from_document(
        "a = %b\nb = %a\nMockProxy.scores = %a\n",
        "cycle.gin",
    )
    .unwrap();
    let resolver = Resolver::new(config);
    let err = resolver.construct("MockProxy", None).unwrap_err();
    assert!(matches!(err, WeftError::CyclicReference { .. }));
    assert!(err.to_string().contains("WEFT-031"));
}

#[test]
fn missing_required_parameter_names_it() {
    let config = ConfigSet::from_document(
        "Trainer.reward = @Reward()\nReward.proxy = @MockProxy()\n",
        "incomplete.gin",
    )
    .unwrap();
    let resolver = Resolver::new(config);
    let err = resolver.construct("Trainer", None).unwrap_err();
    match err {
        WeftError::MissingRequiredParameter { class, param } => {
            assert_eq!(class, "Trainer");
            assert_eq!(param, "objective");
        }
        other => panic!("expected MissingRequiredParameter, got {:?}", other),
    }
}

#[test]
fn key_set_mismatch_precedes_construction() {
    let config = ConfigSet::from_document(
        "ComposedProxy.proxies_dict = {'target': @MismatchProxy()}\n\
         ComposedProxy.weight_dict = {'target': 1.0, 'novelty': 1.0}\n",
        "mismatch.gin",
    )
    .unwrap();
    let resolver = Resolver::with_factories(
        config,
        table_with("MismatchProxy", build_counting_mismatch),
    );

    let err = resolver.construct("ComposedProxy", None).unwrap_err();
    match err {
        WeftError::KeySetMismatch { detail } => {
            assert!(detail.contains("novelty"), "detail: {}", detail);
        }
        other => panic!("expected KeySetMismatch, got {:?}", other),
    }
    // The sub-proxy constructor never ran
    assert_eq!(COUNT_MISMATCH.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_aggregation_fails() {
    let config = ConfigSet::from_document(
        "ComposedProxy.proxies_dict = {'target': @MockProxy()}\n\
         ComposedProxy.weight_dict = {'target': 1.0}\n\
         ComposedProxy.aggregation = 'median'\n",
        "agg.gin",
    )
    .unwrap();
    let resolver = Resolver::new(config);
    let err = resolver.construct("ComposedProxy", None).unwrap_err();
    assert!(matches!(err, WeftError::UnknownAggregation { .. }));
    assert!(err.to_string().contains("median"));
}

// ============================================================================
// OVERRIDE LAWS
// ============================================================================

#[test]
fn later_files_and_bindings_override() {
    let dir = tempfile::TempDir::new().unwrap();
    let base = dir.path().join("base.gin");
    let root = dir.path().join("root.gin");
    std::fs::write(&base, "Trainer.n_iterations = 1\nMockProxy.scores = [0.5]\n").unwrap();
    std::fs::write(
        &root,
        "include 'base.gin'\n\
         Trainer.n_iterations = 2\n\
         Trainer.objective = @TrajectoryBalance()\n\
         Trainer.reward = @Reward()\n\
         Reward.proxy = @MockProxy()\n",
    )
    .unwrap();

    let config = ConfigSet::load_with_bindings(
        &[root],
        &["Trainer.n_iterations = 3".to_string()],
    )
    .unwrap();
    let resolver = Resolver::new(config);
    let trainer = resolver.construct("Trainer", None).unwrap();
    assert_eq!(trainer.as_trainer().unwrap().n_iterations, 3);
}

#[test]
fn defaults_apply_when_unbound() {
    let config = ConfigSet::from_document(
        "Trainer.objective = @TrajectoryBalance()\n\
         Trainer.reward = @Reward()\n\
         Reward.proxy = @MockProxy()\n",
        "defaults.gin",
    )
    .unwrap();
    let resolver = Resolver::new(config);
    let trainer_component = resolver.construct("Trainer", None).unwrap();
    let trainer = trainer_component.as_trainer().unwrap();
    assert_eq!(trainer.run_dir, "runs");
    assert_eq!(trainer.n_iterations, 1000);
    assert!(trainer.replay_buffer.is_none());
}

// ============================================================================
// OPERATIVE CONFIG
// ============================================================================

#[test]
fn operative_config_lists_consumed_bindings_only() {
    let resolver = demo_resolver();
    resolver.construct("Trainer", None).unwrap();
    let operative = resolver.operative_config();

    assert!(operative.contains("Trainer.n_iterations = 100"));
    assert!(operative.contains("run_dir = 'runs/demo'"));
    assert!(operative.contains("target/MockProxy.scores = [1.0, 2.0]"));
    assert!(!operative.contains("unused_macro"));
}

#[test]
fn flat_map_covers_every_winning_binding() {
    let resolver = demo_resolver();
    let flat = resolver.flat_map();
    assert_eq!(flat["Trainer.n_iterations"], serde_json::json!(100));
    assert_eq!(flat["run_dir"], serde_json::json!("runs/demo"));
    assert_eq!(
        flat["Trainer.reward"],
        serde_json::json!("@Reward()")
    );
}

// ============================================================================
// FILE LOADING
// ============================================================================

#[test]
fn load_resolves_nested_includes() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("proxies.gin"),
        "MockProxy.scores = [0.25]\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("root.gin"),
        "include 'proxies.gin'\nReward.proxy = @MockProxy()\n",
    )
    .unwrap();

    let config = ConfigSet::load(PathBuf::from(dir.path().join("root.gin"))).unwrap();
    let resolver = Resolver::new(config);
    let reward = resolver.construct("Reward", None).unwrap();
    let output = reward.as_reward().unwrap().compute(&[0.0]);
    assert_eq!(output.proxy, vec![0.25]);
}
