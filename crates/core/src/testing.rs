use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::calendar::{CalendarInfo, DeviceCalendar, EventDraft};
use crate::error::{CalendarError, NotificationError, StoreError};
use crate::model::{NewTask, TaskPatch};
use crate::notifications::{NotificationRequest, NotificationScheduler, PermissionStatus};
use crate::store::{MemoryTaskStore, SnapshotListener, Subscription, TaskRecordStore};

pub(crate) struct RecordingScheduler {
    permission: PermissionStatus,
    permission_failure: AtomicBool,
    fail_at: Vec<DateTime<Utc>>,
    permission_requests: AtomicUsize,
    scheduled: Mutex<Vec<NotificationRequest>>,
}

impl RecordingScheduler {
    pub(crate) fn granted() -> Self {
        Self::with_permission(PermissionStatus::Granted)
    }

    pub(crate) fn denied() -> Self {
        Self::with_permission(PermissionStatus::Denied)
    }

    fn with_permission(permission: PermissionStatus) -> Self {
        Self {
            permission,
            permission_failure: AtomicBool::new(false),
            fail_at: Vec::new(),
            permission_requests: AtomicUsize::new(0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// The first permission request errors; later ones answer normally.
    pub(crate) fn failing_permission_once(self) -> Self {
        self.permission_failure.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_at(mut self, at: DateTime<Utc>) -> Self {
        self.fail_at.push(at);
        self
    }

    pub(crate) fn scheduled(&self) -> Vec<NotificationRequest> {
        self.scheduled.lock().clone()
    }

    pub(crate) fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationScheduler for RecordingScheduler {
    async fn request_permission(&self) -> Result<PermissionStatus, NotificationError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        if self.permission_failure.swap(false, Ordering::SeqCst) {
            return Err(NotificationError::Backend("permission service unavailable".into()));
        }
        Ok(self.permission)
    }

    async fn schedule(&self, request: NotificationRequest) -> Result<String, NotificationError> {
        if self.fail_at.contains(&request.trigger_at) {
            return Err(NotificationError::Backend("scheduler unavailable".into()));
        }
        let mut scheduled = self.scheduled.lock();
        scheduled.push(request);
        Ok(format!("notif-{}", scheduled.len()))
    }

    async fn cancel_all(&self) -> Result<(), NotificationError> {
        self.scheduled.lock().clear();
        Ok(())
    }
}

pub(crate) struct FakeCalendar {
    calendars: Vec<CalendarInfo>,
    granted: AtomicBool,
    fail_creates: bool,
    permission_requests: AtomicUsize,
    events: Mutex<Vec<(String, EventDraft)>>,
}

impl FakeCalendar {
    pub(crate) fn new(calendars: Vec<CalendarInfo>) -> Self {
        Self {
            calendars,
            granted: AtomicBool::new(true),
            fail_creates: false,
            permission_requests: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_creates(mut self) -> Self {
        self.fail_creates = true;
        self
    }

    pub(crate) fn set_permission(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub(crate) fn events(&self) -> Vec<(String, EventDraft)> {
        self.events.lock().clone()
    }

    pub(crate) fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceCalendar for FakeCalendar {
    async fn request_permission(&self) -> Result<bool, CalendarError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.granted.load(Ordering::SeqCst))
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        Ok(self.calendars.clone())
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        event: EventDraft,
    ) -> Result<String, CalendarError> {
        if self.fail_creates {
            return Err(CalendarError::Backend("calendar provider crashed".into()));
        }
        let mut events = self.events.lock();
        events.push((calendar_id.to_string(), event));
        Ok(format!("evt-{}", events.len()))
    }
}

/// Store whose writes take `delay` to land, optionally failing afterwards.
pub(crate) struct SlowStore {
    pub(crate) inner: Arc<MemoryTaskStore>,
    delay: Duration,
    failure: Option<StoreError>,
    completed_creates: AtomicUsize,
}

impl SlowStore {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryTaskStore::new()),
            delay,
            failure: None,
            completed_creates: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(mut self, err: StoreError) -> Self {
        self.failure = Some(err);
        self
    }

    pub(crate) fn completed_creates(&self) -> usize {
        self.completed_creates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRecordStore for SlowStore {
    async fn create(&self, task: NewTask) -> Result<String, StoreError> {
        tokio::time::sleep(self.delay).await;
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let id = self.inner.create(task).await?;
        self.completed_creates.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<(), StoreError> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    fn subscribe(
        &self,
        user_id: &str,
        listener: SnapshotListener,
    ) -> Result<Subscription, StoreError> {
        self.inner.subscribe(user_id, listener)
    }
}
