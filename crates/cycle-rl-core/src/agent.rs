//! Agent traits and configuration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::CareAction;
use crate::policy::PolicyConfig;
use crate::reward::{Feedback, Reward};
use crate::state::StateKey;
use crate::{RLError, Result};

/// Configuration for a tabular Q-learning agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Learning rate (alpha)
    pub learning_rate: f64,
    /// Discount factor (gamma)
    pub gamma: f64,
    /// Action selection parameters
    #[serde(flatten)]
    pub policy: PolicyConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            gamma: 0.9,
            policy: PolicyConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Reject values the update rule cannot use
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(RLError::Config(format!("learning_rate {} not in (0, 1]", self.learning_rate)));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RLError::Config(format!("gamma {} not in [0, 1]", self.gamma)));
        }
        if !(0.0..=1.0).contains(&self.policy.epsilon) {
            return Err(RLError::Config(format!("epsilon {} not in [0, 1]", self.policy.epsilon)));
        }
        if !(0.0..=1.0).contains(&self.policy.pain_explore_probability) {
            return Err(RLError::Config(format!(
                "pain_explore_probability {} not in [0, 1]",
                self.policy.pain_explore_probability
            )));
        }
        if !self.policy.pain_boost.is_finite() {
            return Err(RLError::Config("pain_boost must be finite".into()));
        }
        Ok(())
    }
}

/// One-step temporal-difference target:
/// `q + alpha * (reward + gamma * max_next - q)`
#[must_use]
pub fn temporal_difference(q: f64, reward: f64, max_next: f64, alpha: f64, gamma: f64) -> f64 {
    q + alpha * (reward + gamma * max_next - q)
}

/// Context of a learning update, carried into the history record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateContext {
    /// Whether the user acted on the suggestion
    pub action_taken: bool,
    /// Next-day energy, if reported
    pub next_day_energy: Option<u8>,
    /// Next-day mood, if reported
    pub next_day_mood: Option<u8>,
}

impl From<&Feedback> for UpdateContext {
    fn from(feedback: &Feedback) -> Self {
        Self {
            action_taken: feedback.action_taken,
            next_day_energy: Some(feedback.next_day_energy),
            next_day_mood: Some(feedback.next_day_mood),
        }
    }
}

/// A per-user learning agent
#[async_trait]
pub trait Agent: Send + Sync {
    /// Select an action for `user` in `state`
    async fn choose_action(&self, user: &str, state: &StateKey) -> Result<CareAction>;

    /// Apply a learning update and return the new value of `(state, action)`
    async fn update(
        &self,
        user: &str,
        state: &StateKey,
        action: CareAction,
        reward: Reward,
        next_state: &StateKey,
        context: UpdateContext,
    ) -> Result<f64>;
}
