//! Reward function over proxy scores
//!
//! Turns raw proxy scores into (log-)rewards for the training objective.
//! Linear boosting scales proxy values by `beta` and clamps to `min_reward`
//! before taking the log; exponential boosting treats the scaled value as a
//! log-reward, clamps to `ln(min_reward)`, and exponentiates. Proxies where
//! lower scores are better are sign-flipped first.

use crate::compose::Proxy;
use crate::error::WeftError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardBoosting {
    Linear,
    Exponential,
}

impl RewardBoosting {
    pub fn from_name(name: &str) -> Result<Self, WeftError> {
        match name {
            "linear" => Ok(RewardBoosting::Linear),
            "exponential" => Ok(RewardBoosting::Exponential),
            other => Err(WeftError::InvalidParameter {
                class: "Reward".to_string(),
                param: "reward_boosting".to_string(),
                reason: format!("'{}' is not one of: linear, exponential", other),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RewardBoosting::Linear => "linear",
            RewardBoosting::Exponential => "exponential",
        }
    }
}

/// Per-batch reward computation result
#[derive(Debug, Clone, Serialize)]
pub struct RewardOutput {
    pub reward: Vec<f64>,
    pub log_reward: Vec<f64>,
    /// Raw proxy scores before boosting
    pub proxy: Vec<f64>,
}

pub struct Reward {
    proxy: Arc<dyn Proxy>,
    boosting: RewardBoosting,
    min_reward: f64,
    min_log_reward: f64,
    beta: f64,
}

impl Reward {
    pub fn new(
        proxy: Arc<dyn Proxy>,
        boosting: RewardBoosting,
        min_reward: f64,
        beta: f64,
    ) -> Result<Self, WeftError> {
        if boosting == RewardBoosting::Linear && !proxy.is_non_negative() {
            return Err(WeftError::InvalidParameter {
                class: "Reward".to_string(),
                param: "reward_boosting".to_string(),
                reason: "linear boosting requires a non-negative proxy".to_string(),
            });
        }
        let min_log_reward = if min_reward > 0.0 {
            min_reward.ln()
        } else {
            f64::NEG_INFINITY
        };
        Ok(Self {
            proxy,
            boosting,
            min_reward,
            min_log_reward,
            beta,
        })
    }

    pub fn proxy(&self) -> &Arc<dyn Proxy> {
        &self.proxy
    }

    pub fn boosting(&self) -> RewardBoosting {
        self.boosting
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Compute rewards for a batch of samples
    pub fn compute(&self, batch: &[f64]) -> RewardOutput {
        let proxy_scores = self.proxy.score_batch(batch);
        let signed: Vec<f64> = if self.proxy.higher_is_better() {
            proxy_scores.clone()
        } else {
            proxy_scores.iter().map(|v| -v).collect()
        };

        let (reward, log_reward): (Vec<f64>, Vec<f64>) = match self.boosting {
            RewardBoosting::Linear => {
                let reward: Vec<f64> = signed
                    .iter()
                    .map(|v| (v * self.beta).max(self.min_reward))
                    .collect();
                let log_reward = reward.iter().map(|r| r.ln()).collect();
                (reward, log_reward)
            }
            RewardBoosting::Exponential => {
                let log_reward: Vec<f64> = signed
                    .iter()
                    .map(|v| (v * self.beta).max(self.min_log_reward))
                    .collect();
                let reward = log_reward.iter().map(|lr| lr.exp()).collect();
                (reward, log_reward)
            }
        };

        RewardOutput {
            reward,
            log_reward,
            proxy: proxy_scores,
        }
    }
}
