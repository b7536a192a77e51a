// Scoped write transaction over the store tables
//
// Every mutation records how to undo itself. `commit` persists the snapshot
// and keeps the changes; dropping the transaction without a successful
// commit replays the undo log in reverse.

use std::path::Path;
use tokio::sync::RwLockWriteGuard;

use cycle_rl_core::{CareAction, HistoryRecord, Notification, NotificationId, Observation, Result, StateKey};

use crate::store::{write_snapshot, Tables};

enum Undo {
    QValue {
        user: String,
        state: StateKey,
        action: CareAction,
        previous: Option<f64>,
    },
    History {
        user: String,
    },
    Observation {
        user: String,
    },
    Notification {
        id: NotificationId,
        previous: Option<Notification>,
    },
    NextNotificationId(NotificationId),
}

pub(crate) struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    snapshot: Option<&'a Path>,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(tables: RwLockWriteGuard<'a, Tables>, snapshot: Option<&'a Path>) -> Self {
        Self {
            tables,
            snapshot,
            undo: Vec::new(),
            committed: false,
        }
    }

    pub(crate) fn tables(&self) -> &Tables {
        &self.tables
    }

    pub(crate) fn set_q_value(&mut self, user: &str, state: &StateKey, action: CareAction, value: f64) {
        let previous = self
            .tables
            .q_values
            .entry(user.to_string())
            .or_default()
            .entry(state.clone())
            .or_default()
            .insert(action, value);
        self.undo.push(Undo::QValue {
            user: user.to_string(),
            state: state.clone(),
            action,
            previous,
        });
    }

    pub(crate) fn append_history(&mut self, record: HistoryRecord) {
        let user = record.user_id.clone();
        self.tables.history.entry(user.clone()).or_default().push(record);
        self.undo.push(Undo::History { user });
    }

    pub(crate) fn append_observation(&mut self, observation: Observation) {
        let user = observation.user_id.clone();
        self.tables.observations.entry(user.clone()).or_default().push(observation);
        self.undo.push(Undo::Observation { user });
    }

    pub(crate) fn allocate_notification_id(&mut self) -> NotificationId {
        let id = self.tables.next_notification_id.max(1);
        self.undo.push(Undo::NextNotificationId(self.tables.next_notification_id));
        self.tables.next_notification_id = id + 1;
        id
    }

    pub(crate) fn put_notification(&mut self, notification: Notification) {
        let id = notification.id;
        let previous = self.tables.notifications.insert(id, notification);
        self.undo.push(Undo::Notification { id, previous });
    }

    /// Persist the snapshot, keeping the changes only if that succeeds
    pub(crate) async fn commit(mut self) -> Result<()> {
        if self.undo.is_empty() {
            self.committed = true;
            return Ok(());
        }
        self.tables.commits += 1;
        if let Some(path) = self.snapshot {
            if let Err(e) = write_snapshot(path, &*self.tables).await {
                self.tables.commits -= 1;
                return Err(e);
            }
        }
        self.committed = true;
        Ok(())
    }

    fn rollback(&mut self) {
        let tables = &mut *self.tables;
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::QValue { user, state, action, previous } => {
                    if let Some(actions) = tables.q_values.get_mut(&user).and_then(|s| s.get_mut(&state)) {
                        match previous {
                            Some(value) => {
                                actions.insert(action, value);
                            }
                            None => {
                                actions.remove(&action);
                            }
                        }
                    }
                }
                Undo::History { user } => {
                    if let Some(records) = tables.history.get_mut(&user) {
                        records.pop();
                    }
                }
                Undo::Observation { user } => {
                    if let Some(observations) = tables.observations.get_mut(&user) {
                        observations.pop();
                    }
                }
                Undo::Notification { id, previous } => match previous {
                    Some(notification) => {
                        tables.notifications.insert(id, notification);
                    }
                    None => {
                        tables.notifications.remove(&id);
                    }
                },
                Undo::NextNotificationId(next) => tables.next_notification_id = next,
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::warn!(changes = self.undo.len(), "rolling back uncommitted store transaction");
            self.rollback();
        }
    }
}
