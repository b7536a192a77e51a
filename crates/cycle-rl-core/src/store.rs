//! Collaborator contracts for persistence
//!
//! The learning core never talks to a database directly. It reads
//! observations from an [`ObservationStore`], keeps notifications in a
//! [`NotificationStore`] and persists Q-values plus history through a
//! [`QValueStore`]. Implementations must make [`QValueStore::commit_update`]
//! all-or-nothing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::CareAction;
use crate::history::HistoryRecord;
use crate::observation::Observation;
use crate::reward::Feedback;
use crate::state::StateKey;
use crate::Result;

/// Identifier of a delivered notification
pub type NotificationId = u64;

/// A notification as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Store-assigned id
    pub id: NotificationId,
    /// Recipient
    pub user_id: String,
    /// Rendered text
    pub message: String,
    /// When it was created
    pub timestamp: DateTime<Utc>,
    /// Action that produced it
    pub action: CareAction,
    /// State the action was chosen in
    pub state: StateKey,
    /// Feedback, once received. At most one per notification.
    pub feedback: Option<Feedback>,
}

/// A notification not yet assigned an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    /// Recipient
    pub user_id: String,
    /// Rendered text
    pub message: String,
    /// Action that produced it
    pub action: CareAction,
    /// State the action was chosen in
    pub state: StateKey,
}

/// Feedback annotation committed together with a learning update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackMark {
    /// Notification being annotated
    pub notification_id: NotificationId,
    /// The feedback itself
    pub feedback: Feedback,
}

/// One stored Q-value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QValueEntry {
    /// State key
    pub state: StateKey,
    /// Action
    pub action: CareAction,
    /// Current estimate
    pub q_value: f64,
}

/// Source of user observations
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Append an observation to its user's sequence
    async fn append_observation(&self, observation: Observation) -> Result<()>;

    /// Most recently recorded observation of `user`
    async fn latest_observation(&self, user: &str) -> Result<Option<Observation>>;

    /// All observations of `user`, oldest first
    async fn observations(&self, user: &str) -> Result<Vec<Observation>>;
}

/// Notification persistence
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification and assign its id
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// Look a notification up by id
    async fn notification(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// All notifications of `user`, oldest first
    async fn notifications(&self, user: &str) -> Result<Vec<Notification>>;
}

/// Q-value and history persistence, partitioned per user
#[async_trait]
pub trait QValueStore: Send + Sync {
    /// Stored value for the triple, if any
    async fn q_value(&self, user: &str, state: &StateKey, action: CareAction) -> Result<Option<f64>>;

    /// Store `value` unless the triple already has one; returns the stored value
    async fn init_q_value(
        &self,
        user: &str,
        state: &StateKey,
        action: CareAction,
        value: f64,
    ) -> Result<f64>;

    /// Insert-if-absent for several actions of one state at once; returns
    /// the stored value of each, in input order
    async fn init_q_values(
        &self,
        user: &str,
        state: &StateKey,
        values: &[(CareAction, f64)],
    ) -> Result<Vec<(CareAction, f64)>> {
        let mut stored = Vec::with_capacity(values.len());
        for &(action, value) in values {
            stored.push((action, self.init_q_value(user, state, action, value).await?));
        }
        Ok(stored)
    }

    /// Overwrite the value of a triple
    async fn set_q_value(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<()>;

    /// Write `record.q_value` for the record's triple, append the record and,
    /// when `feedback` is given, annotate that notification. Either every
    /// write lands or none does.
    async fn commit_update(&self, record: HistoryRecord, feedback: Option<FeedbackMark>) -> Result<()>;

    /// History of `user`, oldest first
    async fn history(&self, user: &str) -> Result<Vec<HistoryRecord>>;

    /// Every stored Q-value of `user`
    async fn q_entries(&self, user: &str) -> Result<Vec<QValueEntry>>;
}
