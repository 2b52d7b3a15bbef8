use async_trait::async_trait;
use ulid::Ulid;

use super::{with_db, SharedDatabase};
use crate::error::StoreError;
use crate::model::{NewTask, Task, TaskPatch};
use crate::store::{SnapshotHub, SnapshotListener, Subscription, TaskRecordStore};

/// Task collection persisted in the local SQLite database.
///
/// Every successful write republishes the owner's full task list to any
/// subscribed listeners.
pub struct SqliteTaskStore {
    db: SharedDatabase,
    hub: SnapshotHub,
}

impl SqliteTaskStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            hub: SnapshotHub::default(),
        }
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let id = id.to_string();
        Ok(with_db(self.db.clone(), move |db| db.fetch_task(&id)).await?)
    }

    pub async fn tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let user_id = user_id.to_string();
        Ok(with_db(self.db.clone(), move |db| db.fetch_tasks_for_user(&user_id)).await?)
    }

    // Runs after the write has committed, so a failure here is only logged.
    async fn republish(&self, user_id: &str) {
        if !self.hub.is_watched(user_id) {
            return;
        }
        let version = self.hub.stamp();
        match self.tasks_for_user(user_id).await {
            Ok(snapshot) => self.hub.publish(user_id, version, snapshot),
            Err(err) => tracing::warn!(user_id, error = %err, "failed to republish task snapshot"),
        }
    }
}

#[async_trait]
impl TaskRecordStore for SqliteTaskStore {
    async fn create(&self, task: NewTask) -> Result<String, StoreError> {
        let id = Ulid::new().to_string();
        let user_id = task.user_id.clone();
        let task_id = id.clone();
        with_db(self.db.clone(), move |db| db.insert_task(&task_id, &task)).await?;
        tracing::debug!(task_id = id.as_str(), user_id = user_id.as_str(), "task stored");

        self.republish(&user_id).await;
        Ok(id)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<(), StoreError> {
        let task_id = id.to_string();
        let owner = with_db(self.db.clone(), move |db| db.update_task(&task_id, &patch)).await?;
        let owner = owner.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.republish(&owner).await;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let task_id = id.to_string();
        let owner = with_db(self.db.clone(), move |db| db.delete_task(&task_id)).await?;
        let owner = owner.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.republish(&owner).await;
        Ok(())
    }

    fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, StoreError> {
        self.hub.register(user_id, listener, || {
            Ok(self.db.lock().fetch_tasks_for_user(user_id)?)
        })
    }
}
