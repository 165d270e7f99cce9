//! Weft - gin-style configuration wiring for training runs

pub mod binder;
pub mod builders;
pub mod components;
pub mod compose;
pub mod error;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod reward;
pub mod store;
pub mod trainer;
pub mod validate;
pub mod value;

pub use binder::{BoundArgs, RawArgs, Resolved, Resolver};
pub use builders::{ConstructorSpec, FactoryTable, ParamSpec};
pub use components::Component;
pub use compose::{Aggregation, ComposedProxy, MockProxy, Proxy};
pub use error::{FixSuggestion, WeftError};
pub use loader::ConfigSet;
pub use registry::SingletonRegistry;
pub use reward::{Reward, RewardBoosting, RewardOutput};
pub use store::KeyValueStore;
pub use trainer::{MetricsCollector, ReplayBuffer, RunLogger, Trainer, TrajectoryBalance};
pub use validate::{validate, Finding, Severity, ValidationReport};
pub use value::{Binding, ConstructorCall, Origin, RawValue};
