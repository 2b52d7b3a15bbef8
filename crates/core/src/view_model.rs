//! Live view of a user's tasks for presentation layers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::model::{Reminder, Task, TaskPatch};
use crate::store::{SnapshotListener, Subscription, TaskRecordStore};

/// Number of reminders shown in the "upcoming" strip.
pub const UPCOMING_LIMIT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingReminder {
    pub task_id: String,
    pub task_title: String,
    pub reminder: Reminder,
}

/// Split tasks into (active, completed), keeping snapshot order.
pub fn partition(tasks: &[Task]) -> (Vec<Task>, Vec<Task>) {
    tasks.iter().cloned().partition(|task| !task.is_completed)
}

/// Incomplete reminders strictly after `now`, soonest first, at most `limit`.
pub fn upcoming(tasks: &[Task], now: DateTime<Utc>, limit: usize) -> Vec<UpcomingReminder> {
    let mut pending: Vec<UpcomingReminder> = tasks
        .iter()
        .flat_map(|task| {
            task.reminders
                .iter()
                .filter(|reminder| reminder.is_pending_after(now))
                .map(|reminder| UpcomingReminder {
                    task_id: task.id.clone(),
                    task_title: task.title.clone(),
                    reminder: reminder.clone(),
                })
        })
        .collect();
    pending.sort_by_key(|item| item.reminder.date);
    pending.truncate(limit);
    pending
}

#[derive(Default)]
struct Cache {
    tasks: Arc<Vec<Task>>,
    loaded: bool,
}

/// Holds the latest snapshot of one user's tasks.
///
/// Every snapshot replaces the cache wholesale. Mutations are written to the
/// store only; the cache changes when the store pushes the next snapshot.
pub struct TaskViewModel {
    store: Arc<dyn TaskRecordStore>,
    user_id: String,
    cache: Arc<RwLock<Cache>>,
    changes: watch::Receiver<u64>,
    _subscription: Subscription,
}

impl TaskViewModel {
    pub fn attach(store: Arc<dyn TaskRecordStore>, user_id: &str) -> Result<Self, StoreError> {
        let cache: Arc<RwLock<Cache>> = Arc::default();
        let (generation, changes) = watch::channel(0u64);

        let sink = cache.clone();
        let listener: SnapshotListener = Arc::new(move |tasks: Vec<Task>| {
            tracing::debug!(count = tasks.len(), "fetched tasks");
            {
                let mut cache = sink.write();
                cache.tasks = Arc::new(tasks);
                cache.loaded = true;
            }
            generation.send_modify(|value| *value += 1);
        });
        let subscription = store.subscribe(user_id, listener)?;

        Ok(Self {
            store,
            user_id: user_id.to_string(),
            cache,
            changes,
            _subscription: subscription,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// False until the first snapshot has arrived.
    pub fn is_loaded(&self) -> bool {
        self.cache.read().loaded
    }

    pub fn tasks(&self) -> Arc<Vec<Task>> {
        self.cache.read().tasks.clone()
    }

    pub fn find(&self, task_id: &str) -> Option<Task> {
        self.tasks().iter().find(|task| task.id == task_id).cloned()
    }

    /// Receiver that ticks once per delivered snapshot.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.clone()
    }

    pub fn active_tasks(&self) -> Vec<Task> {
        partition(&self.tasks()).0
    }

    pub fn completed_tasks(&self) -> Vec<Task> {
        partition(&self.tasks()).1
    }

    pub fn upcoming_reminders(&self, now: DateTime<Utc>) -> Vec<UpcomingReminder> {
        upcoming(&self.tasks(), now, UPCOMING_LIMIT)
    }

    pub async fn toggle_task_complete(&self, task_id: &str) -> Result<(), StoreError> {
        let task = self.cached(task_id)?;
        let patch = TaskPatch::completion(!task.is_completed);
        self.write(task_id, patch).await
    }

    pub async fn toggle_reminder_complete(
        &self,
        task_id: &str,
        index: usize,
    ) -> Result<(), StoreError> {
        let task = self.cached(task_id)?;
        let mut reminders = task.reminders;
        let Some(reminder) = reminders.get_mut(index) else {
            tracing::warn!(task_id, index, "no reminder at index");
            return Err(StoreError::NotFound(format!("{}#{}", task_id, index)));
        };
        reminder.is_completed = !reminder.is_completed;
        self.write(task_id, TaskPatch::reminders(reminders)).await
    }

    pub async fn delete_task(&self, task_id: &str) -> Result<(), StoreError> {
        self.store.delete(task_id).await.map_err(|err| {
            tracing::error!(task_id, error = %err, "failed to delete task");
            err
        })
    }

    fn cached(&self, task_id: &str) -> Result<Task, StoreError> {
        self.find(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    async fn write(&self, task_id: &str, patch: TaskPatch) -> Result<(), StoreError> {
        self.store.update(task_id, patch).await.map_err(|err| {
            tracing::error!(task_id, error = %err, "failed to update task");
            err
        })
    }
}
