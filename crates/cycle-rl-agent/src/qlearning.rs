//! Tabular Q-learning agent with per-user serialized updates

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use cycle_rl_core::{
    temporal_difference, Agent, AgentConfig, CareAction, Decision, FeedbackMark, HistoryRecord,
    PolicyEngine, QTable, QValueStore, Result, Reward, SharedRng, StateKey, UpdateContext,
};

/// Epsilon-greedy Q-learning agent.
///
/// Configuration is immutable after construction. Updates for the same user
/// are serialized so a read-modify-write never loses a concurrent update.
pub struct QLearningAgent {
    config: AgentConfig,
    policy: PolicyEngine,
    table: QTable,
    rng: SharedRng,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QLearningAgent {
    /// Create an agent over `store`, using `rng` for exploration and
    /// Q-value initialization
    pub fn new(config: AgentConfig, store: Arc<dyn QValueStore>, rng: SharedRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            policy: PolicyEngine::new(config.policy),
            table: QTable::new(store, rng.clone()),
            rng,
            user_locks: DashMap::new(),
        })
    }

    /// Agent configuration
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Underlying Q-table
    #[must_use]
    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Acquire the update lock of `user`
    pub async fn lock_user(&self, user: &str) -> OwnedMutexGuard<()> {
        let lock = self.user_locks.entry(user.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Apply the TD update and commit it together with its history record
    /// (and `feedback`, if given). The caller must hold the user's lock.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_update(
        &self,
        user: &str,
        state: &StateKey,
        action: CareAction,
        reward: Reward,
        next_state: &StateKey,
        context: UpdateContext,
        feedback: Option<FeedbackMark>,
    ) -> Result<HistoryRecord> {
        let current = self.table.get(user, state, action).await?;
        let max_next = self.table.max_q_value(user, next_state).await?;
        let q_value = temporal_difference(
            current,
            reward.value(),
            max_next,
            self.config.learning_rate,
            self.config.gamma,
        );

        let record = HistoryRecord {
            user_id: user.to_string(),
            state: state.clone(),
            action,
            q_value,
            action_taken: context.action_taken,
            reward: reward.value(),
            next_day_energy: context.next_day_energy,
            next_day_mood: context.next_day_mood,
            timestamp: Utc::now(),
        };
        self.table.store().commit_update(record.clone(), feedback).await?;

        info!(
            user,
            action = %action,
            reward = reward.value(),
            old_q = current,
            q_value,
            "q-value updated"
        );
        Ok(record)
    }
}

#[async_trait]
impl Agent for QLearningAgent {
    async fn choose_action(&self, user: &str, state: &StateKey) -> Result<CareAction> {
        let decoded = state.decode()?;
        let decision = self.rng.with(|rng| self.policy.decide(&decoded, rng))?;
        let action = match decision {
            Decision::Explore(action) => action,
            Decision::Exploit => {
                let q_values = self.table.all_q_values(user, state).await?;
                self.policy.exploit(&decoded, &q_values)
            }
        };
        debug!(user, action = %action, explored = matches!(decision, Decision::Explore(_)), "action chosen");
        Ok(action)
    }

    async fn update(
        &self,
        user: &str,
        state: &StateKey,
        action: CareAction,
        reward: Reward,
        next_state: &StateKey,
        context: UpdateContext,
    ) -> Result<f64> {
        let _guard = self.lock_user(user).await;
        let record = self
            .apply_update(user, state, action, reward, next_state, context, None)
            .await?;
        Ok(record.q_value)
    }
}
