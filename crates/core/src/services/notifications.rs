use async_trait::async_trait;
use ulid::Ulid;

use super::{with_db, SharedDatabase};
use crate::database::StoredNotification;
use crate::error::NotificationError;
use crate::notifications::{NotificationRequest, NotificationScheduler, PermissionStatus};

/// Notification scheduler that records pending notifications in SQLite.
pub struct LocalNotificationQueue {
    db: SharedDatabase,
}

impl LocalNotificationQueue {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub async fn pending(&self) -> Result<Vec<StoredNotification>, NotificationError> {
        with_db(self.db.clone(), |db| db.pending_notifications())
            .await
            .map_err(backend)
    }
}

fn backend(err: anyhow::Error) -> NotificationError {
    NotificationError::Backend(format!("{:#}", err))
}

#[async_trait]
impl NotificationScheduler for LocalNotificationQueue {
    async fn request_permission(&self) -> Result<PermissionStatus, NotificationError> {
        Ok(PermissionStatus::Granted)
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<String, NotificationError> {
        let id = Ulid::new().to_string();
        let notification_id = id.clone();
        with_db(self.db.clone(), move |db| {
            db.insert_notification(&notification_id, &request)
        })
        .await
        .map_err(backend)?;
        Ok(id)
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        let cleared = with_db(self.db.clone(), |db| db.clear_notifications())
            .await
            .map_err(backend)?;
        tracing::info!(cleared, "cancelled scheduled notifications");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::FixedClock;
    use crate::notifications::ReminderDispatcher;
    use crate::services::test_database;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn dispatcher_persists_future_reminders_only() {
        let (db, _dir) = test_database();
        let queue = Arc::new(LocalNotificationQueue::new(db));
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let dispatcher = ReminderDispatcher::with_clock(queue.clone(), Arc::new(FixedClock(now)));

        let results = dispatcher
            .schedule_many(
                "Reminder: Swab",
                "Time to check your Swab task!",
                &[now - Duration::days(1), now + Duration::days(2)],
            )
            .await;
        assert_eq!(results[0], Ok(None));
        let id = results[1].clone().unwrap().expect("scheduled");

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].request.trigger_at, now + Duration::days(2));
        assert!(pending[0].request.sound);
    }

    #[tokio::test]
    async fn cancel_all_empties_queue() {
        let (db, _dir) = test_database();
        let queue = LocalNotificationQueue::new(db);
        queue
            .schedule(NotificationRequest {
                title: "Reminder: Swab".into(),
                body: "Time to check your Swab task!".into(),
                trigger_at: Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap(),
                sound: true,
            })
            .await
            .unwrap();

        queue.cancel_all().await.unwrap();
        assert!(queue.pending().await.unwrap().is_empty());
    }
}
