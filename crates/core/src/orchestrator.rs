//! Task creation across the record store, local notifications and the calendar.
//!
//! The three backends fail independently and nothing here is transactional.
//! Only validation and a persistence failure that lands inside the timeout
//! window fail the call; notification and calendar problems come back as
//! warnings on a successful outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio_util::task::TaskTracker;

use crate::capture::TaskInput;
use crate::calendar::CalendarMirror;
use crate::error::{StoreError, TaskError};
use crate::model::{NewTask, Reminder};
use crate::notifications::{reminder_body, reminder_title, ReminderDispatcher};
use crate::store::TaskRecordStore;

/// How long task creation waits for the store before reporting the task as queued.
pub const PERSIST_TIMEOUT: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateStatus {
    /// The store confirmed the write and assigned `id`.
    Created { id: String },
    /// The store did not answer in time; the write is still in flight.
    Queued,
}

impl fmt::Display for CreateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateStatus::Created { .. } => write!(f, "Task created"),
            CreateStatus::Queued => write!(f, "Task queued for offline sync"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub scheduled: Vec<String>,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarReport {
    pub event_ids: Vec<String>,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub status: CreateStatus,
    pub reminders: Vec<Reminder>,
    pub notifications: NotificationReport,
    pub calendar: Option<CalendarReport>,
    pub warnings: Vec<TaskError>,
}

impl CreateOutcome {
    pub fn task_id(&self) -> Option<&str> {
        match &self.status {
            CreateStatus::Created { id } => Some(id.as_str()),
            CreateStatus::Queued => None,
        }
    }

    pub fn is_queued(&self) -> bool {
        self.status == CreateStatus::Queued
    }

    pub fn calendar_warning(&self) -> Option<&TaskError> {
        self.warnings
            .iter()
            .find(|w| matches!(w, TaskError::CalendarSync { .. }))
    }

    pub fn notification_warning(&self) -> Option<&TaskError> {
        self.warnings
            .iter()
            .find(|w| matches!(w, TaskError::NotificationScheduling { .. }))
    }
}

pub struct TaskOrchestrator {
    store: Arc<dyn TaskRecordStore>,
    dispatcher: Arc<ReminderDispatcher>,
    mirror: Option<Arc<CalendarMirror>>,
    persist_timeout: Duration,
    writes: TaskTracker,
}

impl TaskOrchestrator {
    pub fn new(store: Arc<dyn TaskRecordStore>, dispatcher: Arc<ReminderDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            mirror: None,
            persist_timeout: PERSIST_TIMEOUT,
            writes: TaskTracker::new(),
        }
    }

    pub fn with_calendar(mut self, mirror: Arc<CalendarMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    pub fn persist_timeout(&self) -> Duration {
        self.persist_timeout
    }

    /// Number of store writes still running, including ones reported as queued.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Wait until every store write started so far has settled.
    pub async fn wait_for_pending_writes(&self) {
        if self.writes.is_empty() {
            return;
        }
        tracing::debug!(pending = self.writes.len(), "waiting for queued task writes");
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// Create a task: persist (racing the timeout), then schedule notifications,
    /// then mirror into the calendar when requested.
    pub async fn create_task(&self, input: TaskInput) -> Result<CreateOutcome, TaskError> {
        input.require_title()?;

        let title = input.title.trim().to_string();
        let description = input.normalized_description();
        let reminders: Vec<Reminder> = input
            .reminder_times
            .iter()
            .copied()
            .map(Reminder::scheduled_at)
            .collect();
        let record = NewTask {
            user_id: input.owner(),
            title: title.clone(),
            description: description.clone(),
            category: input.category.clone(),
            created_at: Utc::now(),
            reminders: reminders.clone(),
            is_completed: false,
        };

        let status = self.persist(record).await?;
        let mut warnings = Vec::new();

        let (notifications, notification_warning) =
            self.schedule_notifications(&title, &input.reminder_times).await;
        warnings.extend(notification_warning);

        let calendar = if input.sync_calendar {
            let (report, calendar_warning) = self
                .mirror_to_calendar(&title, &input.reminder_times, description.as_deref())
                .await;
            warnings.extend(calendar_warning);
            Some(report)
        } else {
            None
        };

        match &status {
            CreateStatus::Created { id } => tracing::info!(
                task_id = id.as_str(),
                reminders = reminders.len(),
                warnings = warnings.len(),
                "task created"
            ),
            CreateStatus::Queued => tracing::info!(
                reminders = reminders.len(),
                warnings = warnings.len(),
                "task queued for offline sync"
            ),
        }

        Ok(CreateOutcome {
            status,
            reminders,
            notifications,
            calendar,
            warnings,
        })
    }

    // The write runs on its own task and answers through a oneshot channel.
    // Whoever settles first wins: if the timeout fires, the receiver is gone
    // and the late result is only logged, never reported to the caller.
    async fn persist(&self, record: NewTask) -> Result<CreateStatus, TaskError> {
        let (tx, rx) = oneshot::channel();
        let store = self.store.clone();
        let user_id = record.user_id.clone();

        self.writes.spawn(async move {
            let result = store.create(record).await;
            if let Err(unclaimed) = tx.send(result) {
                match unclaimed {
                    Ok(id) => tracing::info!(
                        task_id = id.as_str(),
                        user_id = user_id.as_str(),
                        "queued task reached the store"
                    ),
                    Err(err) => tracing::warn!(
                        error = %err,
                        user_id = user_id.as_str(),
                        "queued task failed to persist"
                    ),
                }
            }
        });

        match tokio::time::timeout(self.persist_timeout, rx).await {
            Ok(Ok(Ok(id))) => Ok(CreateStatus::Created { id }),
            Ok(Ok(Err(err))) => {
                tracing::error!(error = %err, "error adding task record");
                Err(TaskError::Persistence(err))
            }
            Ok(Err(_)) => Err(TaskError::Persistence(StoreError::Backend(
                "persistence task ended without a result".into(),
            ))),
            Err(_) => {
                tracing::info!(
                    timeout_ms = self.persist_timeout.as_millis() as u64,
                    "task creation taking a while, assuming offline queue"
                );
                Ok(CreateStatus::Queued)
            }
        }
    }

    async fn schedule_notifications(
        &self,
        title: &str,
        times: &[DateTime<Utc>],
    ) -> (NotificationReport, Option<TaskError>) {
        let results = self
            .dispatcher
            .schedule_many(&reminder_title(title), &reminder_body(title), times)
            .await;

        let mut report = NotificationReport::default();
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(Some(id)) => report.scheduled.push(id),
                Ok(None) => report.skipped += 1,
                Err(err) => errors.push(err.to_string()),
            }
        }
        report.failed = errors.len();

        if errors.is_empty() {
            return (report, None);
        }
        let warning = TaskError::NotificationScheduling {
            failed: errors.len(),
            attempted: times.len(),
            errors,
        };
        tracing::warn!(error = %warning, "failed to schedule notifications");
        (report, Some(warning))
    }

    async fn mirror_to_calendar(
        &self,
        title: &str,
        times: &[DateTime<Utc>],
        notes: Option<&str>,
    ) -> (CalendarReport, Option<TaskError>) {
        let mut report = CalendarReport::default();
        match &self.mirror {
            Some(mirror) => {
                for event in mirror.mirror_many(title, times, notes).await {
                    match event {
                        Some(id) => report.event_ids.push(id),
                        None => report.failed += 1,
                    }
                }
            }
            None => {
                tracing::warn!("calendar sync requested but no calendar is configured");
                report.failed = times.len();
            }
        }

        if report.failed == 0 {
            return (report, None);
        }
        let warning = TaskError::CalendarSync {
            failed: report.failed,
            attempted: times.len(),
        };
        tracing::warn!(error = %warning, "failed to sync to calendar");
        (report, Some(warning))
    }
}
