// Memory store - observations, notifications, Q-values and learning history
// All tables live behind one async RwLock; writes go through a transaction
// that persists a gzip-compressed JSON snapshot before it is kept.
// A persistent store holds an exclusive lock on its data directory for as
// long as it is open, so no other process can load a snapshot that is about
// to be overwritten.

use async_trait::async_trait;
use chrono::Utc;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use cycle_rl_core::{
    CareAction, Feedback, FeedbackMark, HistoryRecord, NewNotification, Notification, NotificationId,
    NotificationStore, Observation, ObservationStore, QValueEntry, QValueStore, RLError, Result,
    StateKey,
};

use crate::config::StoreConfig;
use crate::transaction::Transaction;

/// Snapshot file name inside the data directory
pub const SNAPSHOT_FILE: &str = "cycle-store.json.gz";

/// Lock file guarding the data directory
pub const LOCK_FILE: &str = "cycle-store.lock";

const LOCK_RETRY: Duration = Duration::from_millis(25);

/// Every table of the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub(crate) observations: HashMap<String, Vec<Observation>>,
    pub(crate) notifications: BTreeMap<NotificationId, Notification>,
    pub(crate) next_notification_id: NotificationId,
    pub(crate) q_values: HashMap<String, HashMap<StateKey, HashMap<CareAction, f64>>>,
    pub(crate) history: HashMap<String, Vec<HistoryRecord>>,
    #[serde(default)]
    pub(crate) commits: u64,
}

impl Tables {
    fn q_value(&self, user: &str, state: &StateKey, action: CareAction) -> Option<f64> {
        self.q_values.get(user)?.get(state)?.get(&action).copied()
    }
}

fn unavailable(what: &str, path: &Path, err: impl std::fmt::Display) -> RLError {
    RLError::StoreUnavailable(format!("{what} {}: {err}", path.display()))
}

fn encode_snapshot<T: Serialize + ?Sized>(tables: &T) -> std::result::Result<(usize, Vec<u8>), String> {
    let data = serde_json::to_vec(tables).map_err(|e| e.to_string())?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&data).map_err(|e| e.to_string())?;
    let compressed = encoder.finish().map_err(|e| e.to_string())?;
    Ok((data.len(), compressed))
}

/// Write `tables` to `path` atomically (temp file, then rename).
///
/// Every failure, including encoding, surfaces as `StoreUnavailable`.
pub(crate) async fn write_snapshot<T: Serialize + ?Sized>(path: &Path, tables: &T) -> Result<()> {
    let (bytes, compressed) =
        encode_snapshot(tables).map_err(|e| unavailable("cannot encode snapshot for", path, e))?;

    let tmp = path.with_extension("gz.tmp");
    fs::write(&tmp, compressed)
        .await
        .map_err(|e| unavailable("cannot write snapshot", &tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| unavailable("cannot replace snapshot", path, e))?;

    debug!(bytes, "snapshot written to {:?}", path);
    Ok(())
}

async fn read_snapshot(path: &Path) -> Result<Tables> {
    let compressed = fs::read(path)
        .await
        .map_err(|e| unavailable("cannot read snapshot", path, e))?;

    let mut decoder = GzDecoder::new(&compressed[..]);
    let mut data = Vec::new();
    decoder.read_to_end(&mut data)?;

    serde_json::from_slice(&data).map_err(|e| {
        warn!("snapshot {:?} is corrupt: {}", path, e);
        RLError::from(e)
    })
}

/// Take the exclusive lock on `path`, retrying until `timeout` runs out
async fn lock_data_dir(path: &Path, timeout: Duration) -> Result<File> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| unavailable("cannot open lock file", path, e))?;

    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(file),
            Err(e) if Instant::now() >= deadline => {
                return Err(unavailable("data directory is locked by another store", path, e));
            }
            Err(_) => tokio::time::sleep(LOCK_RETRY).await,
        }
    }
}

/// Store implementing every collaborator trait of the learning core
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
    // released when the store is dropped
    _dir_lock: Option<File>,
}

impl MemoryStore {
    /// Store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            snapshot_path: None,
            _dir_lock: None,
        }
    }

    /// Open a store, loading its snapshot when one exists.
    ///
    /// A persistent store waits up to `config.lock_timeout_ms` for any other
    /// open handle on the same directory to be dropped.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        let Some(dir) = &config.data_dir else {
            return Ok(Self::in_memory());
        };

        fs::create_dir_all(dir)
            .await
            .map_err(|e| unavailable("cannot create data directory", dir, e))?;
        let lock_path = dir.join(LOCK_FILE);
        let dir_lock = lock_data_dir(&lock_path, Duration::from_millis(config.lock_timeout_ms)).await?;
        debug!("locked data directory {:?}", dir);

        let path = dir.join(SNAPSHOT_FILE);
        let tables = if fs::try_exists(&path).await.unwrap_or(false) {
            let tables = read_snapshot(&path).await?;
            info!(
                users = tables.observations.len(),
                notifications = tables.notifications.len(),
                "loaded store snapshot from {:?}",
                path
            );
            tables
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: RwLock::new(tables),
            snapshot_path: Some(path),
            _dir_lock: Some(dir_lock),
        })
    }

    /// Snapshot location, if persistent
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    async fn begin(&self) -> Transaction<'_> {
        Transaction::begin(self.tables.write().await, self.snapshot_path.as_deref())
    }

    /// Number of transactions that changed the store since it was created
    pub async fn commit_count(&self) -> u64 {
        self.tables.read().await.commits
    }

    /// Users with at least one observation
    pub async fn users(&self) -> Vec<String> {
        let mut users: Vec<_> = self.tables.read().await.observations.keys().cloned().collect();
        users.sort();
        users
    }

    /// Append a batch of observations in one transaction
    pub async fn import_observations(&self, observations: Vec<Observation>) -> Result<()> {
        let mut txn = self.begin().await;
        for observation in observations {
            txn.append_observation(observation);
        }
        txn.commit().await
    }

    /// Seed or overwrite Q-values in one transaction
    pub async fn import_q_values(&self, user: &str, entries: &[QValueEntry]) -> Result<()> {
        let mut txn = self.begin().await;
        for entry in entries {
            txn.set_q_value(user, &entry.state, entry.action, entry.q_value);
        }
        txn.commit().await
    }

    /// Insert notifications, optionally already answered, in one transaction
    pub async fn import_notifications(
        &self,
        notifications: Vec<(NewNotification, Option<Feedback>)>,
    ) -> Result<Vec<NotificationId>> {
        let mut txn = self.begin().await;
        let mut ids = Vec::with_capacity(notifications.len());
        for (new, feedback) in notifications {
            let id = txn.allocate_notification_id();
            txn.put_notification(Notification {
                id,
                user_id: new.user_id,
                message: new.message,
                timestamp: Utc::now(),
                action: new.action,
                state: new.state,
                feedback,
            });
            ids.push(id);
        }
        txn.commit().await?;
        Ok(ids)
    }
}

#[async_trait]
impl ObservationStore for MemoryStore {
    async fn append_observation(&self, observation: Observation) -> Result<()> {
        let mut txn = self.begin().await;
        txn.append_observation(observation);
        txn.commit().await
    }

    async fn latest_observation(&self, user: &str) -> Result<Option<Observation>> {
        let tables = self.tables.read().await;
        Ok(tables.observations.get(user).and_then(|obs| obs.last()).cloned())
    }

    async fn observations(&self, user: &str) -> Result<Vec<Observation>> {
        let tables = self.tables.read().await;
        Ok(tables.observations.get(user).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let mut txn = self.begin().await;
        let id = txn.allocate_notification_id();
        let stored = Notification {
            id,
            user_id: notification.user_id,
            message: notification.message,
            timestamp: Utc::now(),
            action: notification.action,
            state: notification.state,
            feedback: None,
        };
        txn.put_notification(stored.clone());
        txn.commit().await?;
        Ok(stored)
    }

    async fn notification(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn notifications(&self, user: &str) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QValueStore for MemoryStore {
    async fn q_value(&self, user: &str, state: &StateKey, action: CareAction) -> Result<Option<f64>> {
        Ok(self.tables.read().await.q_value(user, state, action))
    }

    async fn init_q_value(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<f64> {
        let mut txn = self.begin().await;
        if let Some(existing) = txn.tables().q_value(user, state, action) {
            return Ok(existing);
        }
        txn.set_q_value(user, state, action, value);
        txn.commit().await?;
        Ok(value)
    }

    async fn init_q_values(
        &self,
        user: &str,
        state: &StateKey,
        values: &[(CareAction, f64)],
    ) -> Result<Vec<(CareAction, f64)>> {
        let mut txn = self.begin().await;
        let mut stored = Vec::with_capacity(values.len());
        for &(action, value) in values {
            match txn.tables().q_value(user, state, action) {
                Some(existing) => stored.push((action, existing)),
                None => {
                    txn.set_q_value(user, state, action, value);
                    stored.push((action, value));
                }
            }
        }
        txn.commit().await?;
        Ok(stored)
    }

    async fn set_q_value(&self, user: &str, state: &StateKey, action: CareAction, value: f64) -> Result<()> {
        let mut txn = self.begin().await;
        txn.set_q_value(user, state, action, value);
        txn.commit().await
    }

    async fn commit_update(&self, record: HistoryRecord, feedback: Option<FeedbackMark>) -> Result<()> {
        let mut txn = self.begin().await;

        if let Some(mark) = feedback {
            let mut notification = txn
                .tables()
                .notifications
                .get(&mark.notification_id)
                .cloned()
                .ok_or(RLError::NotificationNotFound(mark.notification_id))?;
            if notification.feedback.is_some() {
                return Err(RLError::FeedbackAlreadyRecorded(mark.notification_id));
            }
            if notification.user_id != record.user_id {
                return Err(RLError::InvalidState(format!(
                    "notification {} belongs to {}, not {}",
                    notification.id, notification.user_id, record.user_id
                )));
            }
            notification.feedback = Some(mark.feedback);
            txn.put_notification(notification);
        }

        txn.set_q_value(&record.user_id, &record.state, record.action, record.q_value);
        txn.append_history(record);
        txn.commit().await
    }

    async fn history(&self, user: &str) -> Result<Vec<HistoryRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.history.get(user).cloned().unwrap_or_default())
    }

    async fn q_entries(&self, user: &str) -> Result<Vec<QValueEntry>> {
        let tables = self.tables.read().await;
        let Some(states) = tables.q_values.get(user) else {
            return Ok(Vec::new());
        };
        Ok(states
            .iter()
            .flat_map(|(state, actions)| {
                actions.iter().map(move |(action, q_value)| QValueEntry {
                    state: state.clone(),
                    action: *action,
                    q_value: *q_value,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycle_rl_core::{CyclePhase, Scores};

    fn state() -> StateKey {
        StateKey::parse(
            r#"{"cycle_phase":"menstrual","sleep_score":6,"mood_score":5,"stress_level":7,"pain_level":8,"time_of_day":"morning","energy_level":4}"#,
        )
        .unwrap()
    }

    fn observation(user: &str, energy: u8) -> Observation {
        Observation::new(
            user,
            CyclePhase::Menstrual,
            Scores { sleep: 6, mood: 5, stress: 7, pain: 8, energy },
            Utc::now(),
        )
        .unwrap()
    }

    fn record(user: &str, q_value: f64) -> HistoryRecord {
        HistoryRecord {
            user_id: user.to_string(),
            state: state(),
            action: CareAction::MagnesiumSuggestion,
            q_value,
            action_taken: true,
            reward: 5.5,
            next_day_energy: Some(7),
            next_day_mood: Some(7),
            timestamp: Utc::now(),
        }
    }

    fn feedback() -> Feedback {
        Feedback { action_taken: true, effectiveness: 8.0, next_day_energy: 7, next_day_mood: 7 }
    }

    async fn notify(store: &MemoryStore, user: &str) -> Notification {
        store
            .insert_notification(NewNotification {
                user_id: user.to_string(),
                message: "hello".into(),
                action: CareAction::MagnesiumSuggestion,
                state: state(),
            })
            .await
            .unwrap()
    }

    /// Turn the data directory into a plain file so every snapshot write fails
    fn break_data_dir(dir: &Path) {
        std::fs::remove_dir_all(dir).unwrap();
        std::fs::write(dir, b"not a directory").unwrap();
    }

    #[tokio::test]
    async fn test_latest_observation_is_last_appended() {
        let store = MemoryStore::in_memory();
        assert!(store.latest_observation("u1").await.unwrap().is_none());
        store.append_observation(observation("u1", 3)).await.unwrap();
        store.append_observation(observation("u1", 9)).await.unwrap();
        store.append_observation(observation("u2", 1)).await.unwrap();

        let latest = store.latest_observation("u1").await.unwrap().unwrap();
        assert_eq!(latest.scores.energy, 9);
        assert_eq!(store.observations("u1").await.unwrap().len(), 2);
        assert_eq!(store.users().await, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[tokio::test]
    async fn test_notification_ids_increase() {
        let store = MemoryStore::in_memory();
        let first = notify(&store, "u1").await;
        let second = notify(&store, "u1").await;
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.notifications("u1").await.unwrap().len(), 2);
        assert!(store.notification(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_init_keeps_existing_value() {
        let store = MemoryStore::in_memory();
        let key = state();
        assert_eq!(store.init_q_value("u1", &key, CareAction::NapSuggestion, 0.05).await.unwrap(), 0.05);
        assert_eq!(store.init_q_value("u1", &key, CareAction::NapSuggestion, -0.07).await.unwrap(), 0.05);
    }

    #[tokio::test]
    async fn test_commit_update_writes_value_history_and_feedback() {
        let store = MemoryStore::in_memory();
        let n = notify(&store, "u1").await;
        let mark = FeedbackMark { notification_id: n.id, feedback: feedback() };

        store.commit_update(record("u1", 0.42), Some(mark)).await.unwrap();

        assert_eq!(
            store.q_value("u1", &state(), CareAction::MagnesiumSuggestion).await.unwrap(),
            Some(0.42)
        );
        assert_eq!(store.history("u1").await.unwrap().len(), 1);
        assert_eq!(store.notification(n.id).await.unwrap().unwrap().feedback, Some(feedback()));
    }

    #[tokio::test]
    async fn test_second_feedback_rejected_without_writes() {
        let store = MemoryStore::in_memory();
        let n = notify(&store, "u1").await;
        let mark = FeedbackMark { notification_id: n.id, feedback: feedback() };
        store.commit_update(record("u1", 0.42), Some(mark)).await.unwrap();

        let err = store.commit_update(record("u1", 9.0), Some(mark)).await.unwrap_err();
        assert!(matches!(err, RLError::FeedbackAlreadyRecorded(id) if id == n.id));
        assert_eq!(
            store.q_value("u1", &state(), CareAction::MagnesiumSuggestion).await.unwrap(),
            Some(0.42)
        );
        assert_eq!(store.history("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_notification_rejected() {
        let store = MemoryStore::in_memory();
        let mark = FeedbackMark { notification_id: 7, feedback: feedback() };
        let err = store.commit_update(record("u1", 1.0), Some(mark)).await.unwrap_err();
        assert!(matches!(err, RLError::NotificationNotFound(7)));
        assert!(store.history("u1").await.unwrap().is_empty());
        assert!(store.q_entries("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::persistent(dir.path().join("data"));
        {
            let store = MemoryStore::open(&config).await.unwrap();
            store.append_observation(observation("u1", 4)).await.unwrap();
            let n = notify(&store, "u1").await;
            let mark = FeedbackMark { notification_id: n.id, feedback: feedback() };
            store.commit_update(record("u1", 0.3), Some(mark)).await.unwrap();
            assert!(store.snapshot_path().unwrap().exists());
        }

        let reopened = MemoryStore::open(&config).await.unwrap();
        assert_eq!(reopened.observations("u1").await.unwrap().len(), 1);
        assert_eq!(reopened.history("u1").await.unwrap().len(), 1);
        assert_eq!(
            reopened.q_value("u1", &state(), CareAction::MagnesiumSuggestion).await.unwrap(),
            Some(0.3)
        );
        assert_eq!(notify(&reopened, "u1").await.id, 2);
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_everything() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let store = MemoryStore::open(&StoreConfig::persistent(&data_dir)).await.unwrap();
        let n = notify(&store, "u1").await;
        store.set_q_value("u1", &state(), CareAction::MagnesiumSuggestion, 0.1).await.unwrap();

        break_data_dir(&data_dir);

        let mark = FeedbackMark { notification_id: n.id, feedback: feedback() };
        let err = store.commit_update(record("u1", 0.9), Some(mark)).await.unwrap_err();
        assert!(matches!(err, RLError::StoreUnavailable(_)));

        assert_eq!(
            store.q_value("u1", &state(), CareAction::MagnesiumSuggestion).await.unwrap(),
            Some(0.1)
        );
        assert!(store.history("u1").await.unwrap().is_empty());
        assert!(store.notification(n.id).await.unwrap().unwrap().feedback.is_none());

        assert!(store.append_observation(observation("u1", 5)).await.is_err());
        assert!(store.latest_observation("u1").await.unwrap().is_none());
        assert!(store.insert_notification(NewNotification {
            user_id: "u1".into(),
            message: "x".into(),
            action: CareAction::Mindfulness,
            state: state(),
        })
        .await
        .is_err());
        assert_eq!(store.notifications("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_handle_on_same_directory_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::persistent(dir.path()).with_lock_timeout_ms(50);
        let _first = MemoryStore::open(&config).await.unwrap();

        let err = MemoryStore::open(&config).await.err().unwrap();
        assert!(matches!(err, RLError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_handles_on_same_directory_keep_every_update() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::persistent(dir.path());

        let first = MemoryStore::open(&config).await.unwrap();
        let n1 = notify(&first, "u1").await;
        let n2 = notify(&first, "u1").await;

        let waiting = {
            let config = config.clone();
            tokio::spawn(async move { MemoryStore::open(&config).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiting.is_finished());

        let mark = FeedbackMark { notification_id: n1.id, feedback: feedback() };
        first.commit_update(record("u1", 0.3), Some(mark)).await.unwrap();
        drop(first);

        let second = waiting.await.unwrap().unwrap();
        assert_eq!(second.history("u1").await.unwrap().len(), 1);
        let err = second.commit_update(record("u1", 0.8), Some(mark)).await.unwrap_err();
        assert!(matches!(err, RLError::FeedbackAlreadyRecorded(id) if id == n1.id));

        let mark = FeedbackMark { notification_id: n2.id, feedback: feedback() };
        second.commit_update(record("u1", 0.5), Some(mark)).await.unwrap();
        drop(second);

        let reopened = MemoryStore::open(&config).await.unwrap();
        assert_eq!(reopened.history("u1").await.unwrap().len(), 2);
        assert!(reopened
            .notifications("u1")
            .await
            .unwrap()
            .iter()
            .all(|n| n.feedback.is_some()));
    }

    #[tokio::test]
    async fn test_batch_init_is_one_commit() {
        let store = MemoryStore::in_memory();
        let key = state();
        store.init_q_value("u1", &key, CareAction::NapSuggestion, 0.05).await.unwrap();
        let before = store.commit_count().await;

        let stored = store
            .init_q_values(
                "u1",
                &key,
                &[
                    (CareAction::MagnesiumSuggestion, 0.02),
                    (CareAction::NapSuggestion, -0.09),
                    (CareAction::Mindfulness, -0.01),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            stored,
            vec![
                (CareAction::MagnesiumSuggestion, 0.02),
                (CareAction::NapSuggestion, 0.05),
                (CareAction::Mindfulness, -0.01),
            ]
        );
        assert_eq!(store.commit_count().await, before + 1);

        // nothing missing, nothing written
        store.init_q_values("u1", &key, &[(CareAction::Mindfulness, 0.09)]).await.unwrap();
        assert_eq!(store.commit_count().await, before + 1);
    }

    #[tokio::test]
    async fn test_unencodable_snapshot_is_store_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE);
        let bad: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);

        let err = write_snapshot(&path, &bad).await.unwrap_err();
        assert!(matches!(err, RLError::StoreUnavailable(_)));
        assert!(!path.exists());
    }
}
