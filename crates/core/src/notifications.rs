//! Local, time-triggered reminder notifications.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::clock::{Clock, SystemClock};
use crate::error::NotificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A one-shot notification fired at `trigger_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub trigger_at: DateTime<Utc>,
    pub sound: bool,
}

/// Host platform notification scheduler.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Must be safe to call any number of times.
    async fn request_permission(&self) -> Result<PermissionStatus, NotificationError>;

    async fn schedule(&self, request: NotificationRequest) -> Result<String, NotificationError>;

    async fn cancel_all(&self) -> Result<(), NotificationError>;
}

pub fn reminder_title(task_title: &str) -> String {
    format!("Reminder: {}", task_title)
}

pub fn reminder_body(task_title: &str) -> String {
    format!("Time to check your {} task!", task_title)
}

/// Schedules reminder notifications, skipping anything not strictly in the future.
///
/// Permission is requested once, lazily, before the first schedule. A denied
/// permission turns every later schedule into a logged skip.
pub struct ReminderDispatcher {
    scheduler: Arc<dyn NotificationScheduler>,
    clock: Arc<dyn Clock>,
    permission: OnceCell<PermissionStatus>,
}

impl ReminderDispatcher {
    pub fn new(scheduler: Arc<dyn NotificationScheduler>) -> Self {
        Self::with_clock(scheduler, Arc::new(SystemClock))
    }

    pub fn with_clock(scheduler: Arc<dyn NotificationScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            scheduler,
            clock,
            permission: OnceCell::new(),
        }
    }

    /// Ask for permission until the scheduler gives an answer, then keep that answer.
    /// A failed request counts as denied for this call only.
    pub async fn ensure_permission(&self) -> PermissionStatus {
        let answer = self
            .permission
            .get_or_try_init(|| async {
                let status = self.scheduler.request_permission().await?;
                if status == PermissionStatus::Denied {
                    tracing::warn!("permission not granted for notifications");
                }
                Ok::<_, NotificationError>(status)
            })
            .await;
        match answer {
            Ok(status) => *status,
            Err(err) => {
                tracing::warn!(error = %err, "notification permission request failed");
                PermissionStatus::Denied
            }
        }
    }

    /// Returns the scheduled notification id, or `None` when the reminder was skipped.
    pub async fn schedule(
        &self,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<String>, NotificationError> {
        if at <= self.clock.now() {
            tracing::debug!(%at, "reminder date is in the past, skipping notification");
            return Ok(None);
        }

        if self.ensure_permission().await == PermissionStatus::Denied {
            tracing::debug!(%at, "notifications disabled, skipping reminder");
            return Ok(None);
        }

        let request = NotificationRequest {
            title: title.to_string(),
            body: body.to_string(),
            trigger_at: at,
            sound: true,
        };
        match self.scheduler.schedule(request).await {
            Ok(id) => {
                tracing::debug!(notification_id = id.as_str(), %at, "notification scheduled");
                Ok(Some(id))
            }
            Err(err) => {
                tracing::error!(error = %err, %at, "error scheduling notification");
                Err(err)
            }
        }
    }

    /// Schedule every timestamp independently; each result settles on its own.
    pub async fn schedule_many(
        &self,
        title: &str,
        body: &str,
        times: &[DateTime<Utc>],
    ) -> Vec<Result<Option<String>, NotificationError>> {
        join_all(times.iter().map(|at| self.schedule(title, body, *at))).await
    }

    pub async fn cancel_all(&self) -> Result<(), NotificationError> {
        self.scheduler.cancel_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::testing::RecordingScheduler;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn dispatcher(scheduler: Arc<RecordingScheduler>) -> ReminderDispatcher {
        ReminderDispatcher::with_clock(scheduler, Arc::new(FixedClock(now())))
    }

    #[tokio::test]
    async fn past_and_present_times_are_skipped() {
        let scheduler = Arc::new(RecordingScheduler::granted());
        let dispatcher = dispatcher(scheduler.clone());

        let present = dispatcher.schedule("t", "b", now()).await.unwrap();
        let past = dispatcher
            .schedule("t", "b", now() - Duration::minutes(1))
            .await
            .unwrap();

        assert_eq!(present, None);
        assert_eq!(past, None);
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test]
    async fn future_time_is_scheduled_with_id() {
        let scheduler = Arc::new(RecordingScheduler::granted());
        let dispatcher = dispatcher(scheduler.clone());
        let at = now() + Duration::days(2);

        let id = dispatcher
            .schedule(&reminder_title("Swab"), &reminder_body("Swab"), at)
            .await
            .unwrap();

        assert!(id.is_some());
        let scheduled = scheduler.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].title, "Reminder: Swab");
        assert_eq!(scheduled[0].body, "Time to check your Swab task!");
        assert_eq!(scheduled[0].trigger_at, at);
    }

    #[tokio::test]
    async fn permission_is_requested_once() {
        let scheduler = Arc::new(RecordingScheduler::granted());
        let dispatcher = dispatcher(scheduler.clone());
        let times = [now() + Duration::days(1), now() + Duration::days(2)];

        dispatcher.schedule_many("t", "b", &times).await;
        dispatcher.ensure_permission().await;

        assert_eq!(scheduler.permission_requests(), 1);
        assert_eq!(scheduler.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn failed_permission_request_is_retried() {
        let scheduler = Arc::new(RecordingScheduler::granted().failing_permission_once());
        let dispatcher = dispatcher(scheduler.clone());
        let at = now() + Duration::days(1);

        assert_eq!(dispatcher.schedule("t", "b", at).await, Ok(None));
        assert!(dispatcher.schedule("t", "b", at).await.unwrap().is_some());
        dispatcher.ensure_permission().await;

        assert_eq!(scheduler.permission_requests(), 2);
        assert_eq!(scheduler.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn denied_permission_degrades_to_skip() {
        let scheduler = Arc::new(RecordingScheduler::denied());
        let dispatcher = dispatcher(scheduler.clone());

        let result = dispatcher
            .schedule("t", "b", now() + Duration::days(1))
            .await;

        assert_eq!(result, Ok(None));
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_siblings() {
        let second = now() + Duration::days(2);
        let scheduler = Arc::new(RecordingScheduler::granted().failing_at(second));
        let dispatcher = dispatcher(scheduler.clone());
        let times = [now() + Duration::days(1), second, now() + Duration::days(3)];

        let results = dispatcher.schedule_many("t", "b", &times).await;

        assert!(results[0].as_ref().unwrap().is_some());
        assert!(results[1].is_err());
        assert!(results[2].as_ref().unwrap().is_some());
        assert_eq!(scheduler.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn cancel_all_clears_pending() {
        let scheduler = Arc::new(RecordingScheduler::granted());
        let dispatcher = dispatcher(scheduler.clone());
        dispatcher
            .schedule("t", "b", now() + Duration::days(1))
            .await
            .unwrap();

        dispatcher.cancel_all().await.unwrap();
        assert!(scheduler.scheduled().is_empty());
    }
}
