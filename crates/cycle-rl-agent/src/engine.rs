//! Notification engine: proposals in, feedback back
//!
//! Glues the state encoder, the Q-learning agent, the reward calculator and
//! the message renderer to a store implementing all three collaborator
//! traits.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use cycle_rl_core::{
    message, summarize, Agent, AgentConfig, Analytics, CareAction, CyclePhase, Feedback,
    FeedbackMark, HistoryRecord, NewNotification, NotificationId, NotificationStore, Observation,
    ObservationStore, QValueEntry, QValueStore, RLError, Result, RewardCalculator, Scores,
    SharedRng, StateEncoder, StateKey, UpdateContext,
};

use crate::qlearning::QLearningAgent;

/// A delivered suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Id to reference when giving feedback
    pub notification_id: NotificationId,
    /// State the action was chosen in
    pub state: StateKey,
    /// Chosen action
    pub action: CareAction,
    /// Rendered message
    pub message: String,
}

/// Result of applying feedback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    /// Notification the feedback was for
    pub notification_id: NotificationId,
    /// Computed reward
    pub reward: f64,
    /// Q-value after the update
    pub q_value: f64,
}

/// Personalized notification engine
pub struct NotificationEngine<S> {
    store: Arc<S>,
    agent: QLearningAgent,
    encoder: StateEncoder,
    rewards: RewardCalculator,
    rng: SharedRng,
}

impl<S> NotificationEngine<S>
where
    S: ObservationStore + NotificationStore + QValueStore + 'static,
{
    /// Build an engine over `store`
    pub fn new(store: Arc<S>, config: AgentConfig, encoder: StateEncoder, rng: SharedRng) -> Result<Self> {
        let q_store: Arc<dyn QValueStore> = store.clone();
        Ok(Self {
            agent: QLearningAgent::new(config, q_store, rng.clone())?,
            store,
            encoder,
            rewards: RewardCalculator::default(),
            rng,
        })
    }

    /// The learning agent
    #[must_use]
    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Record a new observation for `user`, stamped now
    pub async fn record_observation(&self, user: &str, phase: CyclePhase, scores: Scores) -> Result<Observation> {
        let observation = Observation::new(user, phase, scores, Utc::now())?;
        self.store.append_observation(observation.clone()).await?;
        info!(user, phase = %phase, "observation recorded");
        Ok(observation)
    }

    /// Choose and persist a suggestion for the user's current state
    pub async fn propose_action(&self, user: &str) -> Result<Proposal> {
        let latest = self.store.latest_observation(user).await?;
        let state = self.encoder.encode_latest(user, latest.as_ref())?;
        let action = self.agent.choose_action(user, &state).await?;

        let decoded = state.decode()?;
        let text = self.rng.with(|rng| message::render(action, &decoded, rng))?;

        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id: user.to_string(),
                message: text,
                action,
                state: state.clone(),
            })
            .await?;

        info!(user, notification_id = notification.id, action = %action, "notification proposed");
        Ok(Proposal {
            notification_id: notification.id,
            state,
            action,
            message: notification.message,
        })
    }

    /// Apply deferred feedback to the notification's `(state, action)`.
    ///
    /// Unknown ids, repeated feedback and out-of-range ratings fail without
    /// touching the store.
    pub async fn record_feedback(&self, notification_id: NotificationId, feedback: Feedback) -> Result<FeedbackOutcome> {
        let found = self
            .store
            .notification(notification_id)
            .await?
            .ok_or(RLError::NotificationNotFound(notification_id))?;
        let user = found.user_id.as_str();

        let _guard = self.agent.lock_user(user).await;
        // re-read under the lock: a concurrent submission may have landed
        let notification = self
            .store
            .notification(notification_id)
            .await?
            .ok_or(RLError::NotificationNotFound(notification_id))?;
        if notification.feedback.is_some() {
            warn!(user, notification_id, "duplicate feedback rejected");
            return Err(RLError::FeedbackAlreadyRecorded(notification_id));
        }
        feedback.validate()?;

        let previous = self.store.latest_observation(user).await?;
        let reward = self.rewards.reward(&feedback, previous.as_ref());
        let next_state = match previous.as_ref() {
            Some(observation) => self.encoder.encode(observation)?,
            None => notification.state.clone(),
        };

        let record = self
            .agent
            .apply_update(
                user,
                &notification.state,
                notification.action,
                reward,
                &next_state,
                UpdateContext::from(&feedback),
                Some(FeedbackMark { notification_id, feedback }),
            )
            .await?;

        Ok(FeedbackOutcome {
            notification_id,
            reward: record.reward,
            q_value: record.q_value,
        })
    }

    /// Reward analytics over the user's history
    pub async fn analytics(&self, user: &str) -> Result<Analytics> {
        Ok(summarize(&self.store.history(user).await?))
    }

    /// Learning history of `user`
    pub async fn history(&self, user: &str) -> Result<Vec<HistoryRecord>> {
        self.store.history(user).await
    }

    /// Stored Q-values of `user`, sorted by state then action
    pub async fn q_table(&self, user: &str) -> Result<Vec<QValueEntry>> {
        let mut entries = self.store.q_entries(user).await?;
        entries.sort_by(|a, b| a.state.cmp(&b.state).then(a.action.cmp(&b.action)));
        Ok(entries)
    }
}
