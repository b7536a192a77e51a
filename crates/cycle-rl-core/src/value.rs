//! Per-user tabular action-value function

use rand::Rng;
use std::sync::Arc;
use tracing::debug;

use crate::action::CareAction;
use crate::rng::SharedRng;
use crate::state::StateKey;
use crate::store::QValueStore;
use crate::{RLError, Result};

/// Half-width of the uniform range unseen entries are initialized from
pub const INIT_RANGE: f64 = 0.1;

/// Tabular Q-function over a [`QValueStore`].
///
/// Unseen `(user, state, action)` triples are initialized to a small random
/// value on first read and persisted immediately, so later reads are stable
/// and ties between untried actions are broken randomly rather than by
/// enumeration order.
#[derive(Clone)]
pub struct QTable {
    store: Arc<dyn QValueStore>,
    rng: SharedRng,
}

impl QTable {
    /// Create a table over `store`, drawing initial values from `rng`
    pub fn new(store: Arc<dyn QValueStore>, rng: SharedRng) -> Self {
        Self { store, rng }
    }

    /// Backing store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn QValueStore> {
        &self.store
    }

    /// Current value of the triple, initializing it when unseen
    pub async fn get(&self, user: &str, state: &StateKey, action: CareAction) -> Result<f64> {
        if let Some(value) = self.store.q_value(user, state, action).await? {
            return Ok(value);
        }
        let initial = self.rng.with(|rng| rng.gen_range(-INIT_RANGE..=INIT_RANGE))?;
        let stored = self.store.init_q_value(user, state, action, initial).await?;
        debug!(user, action = %action, q_value = stored, "initialized q-value");
        Ok(stored)
    }

    /// Overwrite the triple
    pub async fn set(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(RLError::Computation(format!("refusing to store non-finite q-value {value}")));
        }
        self.store.set_q_value(user, state, action, value).await
    }

    /// Values of every action in `state`, in enumeration order.
    ///
    /// Unseen actions are initialized together in one store call.
    pub async fn all_q_values(&self, user: &str, state: &StateKey) -> Result<Vec<(CareAction, f64)>> {
        let mut values = Vec::with_capacity(CareAction::ALL.len());
        let mut missing = Vec::new();
        for action in CareAction::ALL {
            match self.store.q_value(user, state, action).await? {
                Some(value) => values.push((action, value)),
                None => missing.push(action),
            }
        }
        if missing.is_empty() {
            return Ok(values);
        }

        let initial: Vec<(CareAction, f64)> = self.rng.with(|rng| {
            missing
                .iter()
                .map(|&action| (action, rng.gen_range(-INIT_RANGE..=INIT_RANGE)))
                .collect()
        })?;
        let stored = self.store.init_q_values(user, state, &initial).await?;
        debug!(user, count = stored.len(), "initialized q-values");

        values.extend(stored);
        values.sort_by_key(|(action, _)| CareAction::ALL.iter().position(|a| a == action));
        Ok(values)
    }

    /// `max_a Q(state, a)`, initializing any untried action
    pub async fn max_q_value(&self, user: &str, state: &StateKey) -> Result<f64> {
        let values = self.all_q_values(user, state).await?;
        Ok(values.into_iter().map(|(_, v)| v).fold(f64::NEG_INFINITY, f64::max))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::HistoryRecord;
    use crate::store::{FeedbackMark, QValueEntry};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// Minimal in-memory store for exercising the table
    #[derive(Default)]
    pub(crate) struct MapStore {
        pub values: Mutex<HashMap<(String, StateKey, CareAction), f64>>,
        pub history: Mutex<Vec<HistoryRecord>>,
    }

    #[async_trait]
    impl QValueStore for MapStore {
        async fn q_value(&self, user: &str, state: &StateKey, action: CareAction) -> Result<Option<f64>> {
            Ok(self.values.lock().await.get(&(user.to_string(), state.clone(), action)).copied())
        }

        async fn init_q_value(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<f64> {
            let mut values = self.values.lock().await;
            Ok(*values.entry((user.to_string(), state.clone(), action)).or_insert(value))
        }

        async fn set_q_value(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<()> {
            self.values.lock().await.insert((user.to_string(), state.clone(), action), value);
            Ok(())
        }

        async fn commit_update(&self, record: HistoryRecord, _feedback: Option<FeedbackMark>) -> Result<()> {
            self.values
                .lock()
                .await
                .insert((record.user_id.clone(), record.state.clone(), record.action), record.q_value);
            self.history.lock().await.push(record);
            Ok(())
        }

        async fn history(&self, user: &str) -> Result<Vec<HistoryRecord>> {
            Ok(self.history.lock().await.iter().filter(|r| r.user_id == user).cloned().collect())
        }

        async fn q_entries(&self, user: &str) -> Result<Vec<QValueEntry>> {
            Ok(self
                .values
                .lock()
                .await
                .iter()
                .filter(|((u, _, _), _)| u == user)
                .map(|((_, state, action), v)| QValueEntry { state: state.clone(), action: *action, q_value: *v })
                .collect())
        }
    }

    pub(crate) fn key(pain: u8) -> StateKey {
        StateKey::parse(format!(
            r#"{{"cycle_phase":"menstrual","sleep_score":6,"mood_score":5,"stress_level":7,"pain_level":{pain},"time_of_day":"morning","energy_level":4}}"#
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_lazy_init_is_bounded_and_stable() {
        let table = QTable::new(Arc::new(MapStore::default()), SharedRng::seeded(42));
        let state = key(8);
        for action in CareAction::ALL {
            let first = table.get("u1", &state, action).await.unwrap();
            assert!((-INIT_RANGE..=INIT_RANGE).contains(&first));
            let second = table.get("u1", &state, action).await.unwrap();
            assert_eq!(first, second);
        }
    }

    #[tokio::test]
    async fn test_users_do_not_share_entries() {
        let store = Arc::new(MapStore::default());
        let table = QTable::new(store.clone(), SharedRng::seeded(1));
        table.set("u1", &key(8), CareAction::Mindfulness, 3.0).await.unwrap();
        let other = table.get("u2", &key(8), CareAction::Mindfulness).await.unwrap();
        assert!(other.abs() <= INIT_RANGE);
        assert_eq!(table.get("u1", &key(8), CareAction::Mindfulness).await.unwrap(), 3.0);
    }

    #[tokio::test]
    async fn test_max_initializes_every_action() {
        let store = Arc::new(MapStore::default());
        let table = QTable::new(store.clone(), SharedRng::seeded(3));
        table.set("u1", &key(2), CareAction::HealthySnack, 0.7).await.unwrap();
        let max = table.max_q_value("u1", &key(2)).await.unwrap();
        assert_eq!(max, 0.7);
        assert_eq!(store.values.lock().await.len(), CareAction::ALL.len());
    }

    #[tokio::test]
    async fn test_set_rejects_nan() {
        let table = QTable::new(Arc::new(MapStore::default()), SharedRng::seeded(3));
        assert!(table.set("u1", &key(2), CareAction::HealthySnack, f64::NAN).await.is_err());
    }
}
