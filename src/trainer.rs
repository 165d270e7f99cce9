//! Trainer and collaborator configurations
//!
//! These are the opaque consumers the configuration layer wires together.
//! Each is an explicit struct with declared fields - the binder populates
//! them through typed accessors, never by reflection. Their runtime
//! behavior (the training loop itself) lives outside this crate.

use crate::error::WeftError;
use crate::reward::Reward;
use std::fmt::Write as _;
use std::sync::Arc;

/// Trajectory-balance objective configuration
pub struct TrajectoryBalance {
    /// Initial estimate of the log partition function
    pub z_init: f64,
}

impl TrajectoryBalance {
    pub fn new(z_init: f64) -> Self {
        Self { z_init }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prioritization {
    Uniform,
    Reward,
}

impl Prioritization {
    pub fn from_name(name: &str) -> Result<Self, WeftError> {
        match name {
            "uniform" => Ok(Prioritization::Uniform),
            "reward" => Ok(Prioritization::Reward),
            other => Err(WeftError::InvalidParameter {
                class: "ReplayBuffer".to_string(),
                param: "prioritization".to_string(),
                reason: format!("'{}' is not one of: uniform, reward", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Prioritization::Uniform => "uniform",
            Prioritization::Reward => "reward",
        }
    }
}

pub struct ReplayBuffer {
    pub capacity: usize,
    pub prioritization: Prioritization,
}

impl ReplayBuffer {
    pub fn new(capacity: i64, prioritization: Prioritization) -> Result<Self, WeftError> {
        if capacity <= 0 {
            return Err(WeftError::InvalidParameter {
                class: "ReplayBuffer".to_string(),
                param: "capacity".to_string(),
                reason: format!("must be positive, got {}", capacity),
            });
        }
        Ok(Self {
            capacity: capacity as usize,
            prioritization,
        })
    }
}

pub struct MetricsCollector {
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    Console,
    File,
}

impl LogBackend {
    pub fn from_name(name: &str) -> Result<Self, WeftError> {
        match name {
            "console" => Ok(LogBackend::Console),
            "file" => Ok(LogBackend::File),
            other => Err(WeftError::InvalidParameter {
                class: "RunLogger".to_string(),
                param: "backend".to_string(),
                reason: format!("'{}' is not one of: console, file", other),
            }),
        }
    }
}

pub struct RunLogger {
    pub backend: LogBackend,
    pub log_dir: Option<String>,
}

impl RunLogger {
    pub fn new(backend: LogBackend, log_dir: Option<String>) -> Result<Self, WeftError> {
        if backend == LogBackend::File && log_dir.is_none() {
            return Err(WeftError::InvalidParameter {
                class: "RunLogger".to_string(),
                param: "log_dir".to_string(),
                reason: "required when backend = 'file'".to_string(),
            });
        }
        Ok(Self { backend, log_dir })
    }
}

/// Root of the wired object graph
pub struct Trainer {
    pub objective: Arc<TrajectoryBalance>,
    pub reward: Arc<Reward>,
    pub run_dir: String,
    pub n_iterations: i64,
    pub replay_buffer: Option<Arc<ReplayBuffer>>,
    pub metrics: Option<Arc<MetricsCollector>>,
    pub logger: Option<Arc<RunLogger>>,
}

impl Trainer {
    /// Human-readable wiring summary for the CLI
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Trainer");
        let _ = writeln!(out, "  run_dir: {}", self.run_dir);
        let _ = writeln!(out, "  n_iterations: {}", self.n_iterations);
        let _ = writeln!(out, "  objective: TrajectoryBalance(z_init={:?})", self.objective.z_init);
        let _ = writeln!(
            out,
            "  reward: {} boosting, beta={:?}, proxy={}",
            self.reward.boosting().name(),
            self.reward.beta(),
            self.reward.proxy().name()
        );
        match &self.replay_buffer {
            Some(buffer) => {
                let _ = writeln!(
                    out,
                    "  replay_buffer: capacity={}, prioritization={}",
                    buffer.capacity,
                    buffer.prioritization.name()
                );
            }
            None => {
                let _ = writeln!(out, "  replay_buffer: (none)");
            }
        }
        if let Some(metrics) = &self.metrics {
            let _ = writeln!(out, "  metrics: [{}]", metrics.metrics.join(", "));
        }
        if let Some(logger) = &self.logger {
            let backend = match logger.backend {
                LogBackend::Console => "console".to_string(),
                LogBackend::File => {
                    format!("file ({})", logger.log_dir.as_deref().unwrap_or("?"))
                }
            };
            let _ = writeln!(out, "  logger: {}", backend);
        }
        out
    }
}
