use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::calendar::CalendarMirror;
use crate::capture::{TaskInput, ANONYMOUS_USER};
use crate::config::AppConfig;
use crate::error::{ScheduleError, StoreError, TaskError};
use crate::notifications::ReminderDispatcher;
use crate::orchestrator::{CreateOutcome, TaskOrchestrator};
use crate::schedule::{self, Selection};
use crate::services::{
    open_shared, LocalCalendar, LocalNotificationQueue, SqliteTaskStore,
};
use crate::store::TaskRecordStore;
use crate::view_model::TaskViewModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub id: String,
    pub deleted: bool,
}

/// Local backends wired into a task orchestrator for one data directory.
pub struct Workspace {
    config: AppConfig,
    store: Arc<SqliteTaskStore>,
    notifications: Arc<LocalNotificationQueue>,
    calendar: Arc<LocalCalendar>,
    orchestrator: TaskOrchestrator,
}

impl Workspace {
    pub fn open(config: AppConfig) -> Result<Self> {
        let db = open_shared(&config)?;
        let store = Arc::new(SqliteTaskStore::new(db.clone()));
        let notifications = Arc::new(LocalNotificationQueue::new(db.clone()));
        let calendar = Arc::new(LocalCalendar::new(db));

        let dispatcher = Arc::new(ReminderDispatcher::new(notifications.clone()));
        let mirror = Arc::new(CalendarMirror::new(
            calendar.clone(),
            config.calendar_timezone(),
        ));
        let orchestrator = TaskOrchestrator::new(store.clone(), dispatcher)
            .with_calendar(mirror)
            .with_persist_timeout(config.persist_timeout());

        tracing::debug!(db = %config.db_path().display(), "workspace opened");
        Ok(Self {
            config,
            store,
            notifications,
            calendar,
            orchestrator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Configured user, or the anonymous owner.
    pub fn user_id(&self) -> String {
        self.config
            .user_id()
            .unwrap_or(ANONYMOUS_USER)
            .to_string()
    }

    pub fn store(&self) -> Arc<SqliteTaskStore> {
        self.store.clone()
    }

    pub fn notifications(&self) -> &LocalNotificationQueue {
        &self.notifications
    }

    pub fn calendar(&self) -> &LocalCalendar {
        &self.calendar
    }

    pub fn orchestrator(&self) -> &TaskOrchestrator {
        &self.orchestrator
    }

    /// Create a task owned by the configured user unless `input` names one.
    pub async fn create_task(&self, mut input: TaskInput) -> Result<CreateOutcome, TaskError> {
        if input.user_id.is_none() {
            input.user_id = self.config.user_id().map(str::to_string);
        }
        self.orchestrator.create_task(input).await
    }

    /// Let queued store writes land before the runtime goes away.
    pub async fn wait_for_pending_writes(&self) {
        self.orchestrator.wait_for_pending_writes().await;
    }

    pub fn attach_view(&self) -> Result<TaskViewModel, StoreError> {
        TaskViewModel::attach(self.store.clone(), &self.user_id())
    }

    /// Delete every id independently and report which ones existed.
    pub async fn delete_tasks(&self, ids: &[String]) -> Result<Vec<DeleteResult>, StoreError> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let deleted = match self.store.delete(id).await {
                Ok(()) => true,
                Err(StoreError::NotFound(_)) => false,
                Err(err) => return Err(err),
            };
            results.push(DeleteResult {
                id: id.clone(),
                deleted,
            });
        }
        Ok(results)
    }
}

/// Reminder times a selection would produce, without creating anything.
pub fn preview_reminders<Tz: TimeZone>(
    start: &DateTime<Tz>,
    selection: &Selection,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    schedule::derive(start, selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskCategory;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn workspace(user: Option<&str>) -> (Workspace, TempDir) {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf())
            .unwrap()
            .with_user(user.map(str::to_string));
        (Workspace::open(config).unwrap(), dir)
    }

    #[tokio::test]
    async fn created_task_is_visible_through_view() {
        let (workspace, _dir) = workspace(Some("tech-4"));
        let future = Utc::now() + chrono::Duration::days(2);
        let outcome = workspace
            .create_task(TaskInput {
                title: "Blood culture".into(),
                category: TaskCategory::microbiology(),
                reminder_times: vec![future],
                sync_calendar: true,
                ..TaskInput::default()
            })
            .await
            .unwrap();

        assert!(outcome.warnings.is_empty());
        let id = outcome.task_id().expect("created").to_string();
        let view = workspace.attach_view().unwrap();
        let task = view.find(&id).expect("visible");
        assert_eq!(task.user_id, "tech-4");
        assert_eq!(workspace.notifications().pending().await.unwrap().len(), 1);
        assert_eq!(workspace.calendar().events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn queued_create_lands_after_waiting() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_data_dir(dir.path().to_path_buf())
            .unwrap()
            .with_user(Some("tech-9".into()))
            .with_persist_timeout(std::time::Duration::ZERO);
        let workspace = Workspace::open(config).unwrap();

        let outcome = workspace
            .create_task(TaskInput {
                title: "Late swab".into(),
                ..TaskInput::default()
            })
            .await
            .unwrap();
        assert!(outcome.is_queued());

        workspace.wait_for_pending_writes().await;

        assert_eq!(workspace.orchestrator().pending_writes(), 0);
        let view = workspace.attach_view().unwrap();
        let titles: Vec<String> = view.tasks().iter().map(|t| t.title.clone()).collect();
        assert_eq!(titles, vec!["Late swab".to_string()]);
    }

    #[tokio::test]
    async fn delete_reports_each_id() {
        let (workspace, _dir) = workspace(None);
        assert_eq!(workspace.user_id(), ANONYMOUS_USER);
        let outcome = workspace
            .create_task(TaskInput {
                title: "Swab".into(),
                ..TaskInput::default()
            })
            .await
            .unwrap();
        let id = outcome.task_id().unwrap().to_string();

        let results = workspace
            .delete_tasks(&[id.clone(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(
            results,
            vec![
                DeleteResult { id, deleted: true },
                DeleteResult {
                    id: "missing".into(),
                    deleted: false
                },
            ]
        );
    }
}
