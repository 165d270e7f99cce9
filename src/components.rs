//! Built component handles
//!
//! The closed set of object kinds the factory table can produce. Handles
//! are `Arc`-shared: cloning a `Component` never re-runs a constructor, and
//! singleton identity is observable through [`Component::ptr_eq`].

use crate::compose::Proxy;
use crate::reward::Reward;
use crate::trainer::{MetricsCollector, ReplayBuffer, RunLogger, Trainer, TrajectoryBalance};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub enum Component {
    Proxy(Arc<dyn Proxy>),
    Objective(Arc<TrajectoryBalance>),
    Reward(Arc<Reward>),
    ReplayBuffer(Arc<ReplayBuffer>),
    Metrics(Arc<MetricsCollector>),
    Logger(Arc<RunLogger>),
    Trainer(Arc<Trainer>),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Proxy(_) => "proxy",
            Component::Objective(_) => "objective",
            Component::Reward(_) => "reward",
            Component::ReplayBuffer(_) => "replay buffer",
            Component::Metrics(_) => "metrics collector",
            Component::Logger(_) => "logger",
            Component::Trainer(_) => "trainer",
        }
    }

    pub fn as_proxy(&self) -> Option<&Arc<dyn Proxy>> {
        match self {
            Component::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_objective(&self) -> Option<&Arc<TrajectoryBalance>> {
        match self {
            Component::Objective(objective) => Some(objective),
            _ => None,
        }
    }

    pub fn as_reward(&self) -> Option<&Arc<Reward>> {
        match self {
            Component::Reward(reward) => Some(reward),
            _ => None,
        }
    }

    pub fn as_replay_buffer(&self) -> Option<&Arc<ReplayBuffer>> {
        match self {
            Component::ReplayBuffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_metrics(&self) -> Option<&Arc<MetricsCollector>> {
        match self {
            Component::Metrics(metrics) => Some(metrics),
            _ => None,
        }
    }

    pub fn as_logger(&self) -> Option<&Arc<RunLogger>> {
        match self {
            Component::Logger(logger) => Some(logger),
            _ => None,
        }
    }

    pub fn as_trainer(&self) -> Option<&Arc<Trainer>> {
        match self {
            Component::Trainer(trainer) => Some(trainer),
            _ => None,
        }
    }

    /// True when both handles point at the same underlying instance
    pub fn ptr_eq(&self, other: &Component) -> bool {
        match (self, other) {
            (Component::Proxy(a), Component::Proxy(b)) => Arc::ptr_eq(a, b),
            (Component::Objective(a), Component::Objective(b)) => Arc::ptr_eq(a, b),
            (Component::Reward(a), Component::Reward(b)) => Arc::ptr_eq(a, b),
            (Component::ReplayBuffer(a), Component::ReplayBuffer(b)) => Arc::ptr_eq(a, b),
            (Component::Metrics(a), Component::Metrics(b)) => Arc::ptr_eq(a, b),
            (Component::Logger(a), Component::Logger(b)) => Arc::ptr_eq(a, b),
            (Component::Trainer(a), Component::Trainer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.kind())
    }
}
