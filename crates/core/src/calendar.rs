//! Best-effort mirroring of reminders into the device calendar.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

pub const EVENT_DURATION_MINUTES: i64 = 60;
pub const EARLY_ALARM_MINUTES: i64 = 15;
const DEFAULT_SOURCE_NAME: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    pub is_primary: bool,
    pub is_modifiable: bool,
    pub source_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmMethod {
    Alert,
}

/// Alarm relative to the event start; negative offsets fire before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub relative_offset_minutes: i64,
    pub method: AlarmMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub notes: Option<String>,
    pub alarms: Vec<Alarm>,
    pub timezone: String,
}

impl EventDraft {
    pub fn reminder(title: &str, start: DateTime<Utc>, notes: Option<&str>, timezone: &str) -> Self {
        Self {
            title: title.to_string(),
            start,
            end: start + Duration::minutes(EVENT_DURATION_MINUTES),
            notes: notes.map(str::to_string),
            alarms: vec![
                Alarm {
                    relative_offset_minutes: 0,
                    method: AlarmMethod::Alert,
                },
                Alarm {
                    relative_offset_minutes: -EARLY_ALARM_MINUTES,
                    method: AlarmMethod::Alert,
                },
            ],
            timezone: timezone.to_string(),
        }
    }
}

/// Host device calendar.
#[async_trait]
pub trait DeviceCalendar: Send + Sync {
    async fn request_permission(&self) -> Result<bool, CalendarError>;

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError>;

    async fn create_event(
        &self,
        calendar_id: &str,
        event: EventDraft,
    ) -> Result<String, CalendarError>;
}

/// Pick the destination calendar: a primary modifiable one (explicitly flagged,
/// or sourced from the platform's "Default" account), else the first modifiable.
pub fn select_calendar(calendars: &[CalendarInfo]) -> Option<&CalendarInfo> {
    calendars
        .iter()
        .find(|c| c.is_modifiable && c.is_primary)
        .or_else(|| {
            calendars
                .iter()
                .find(|c| c.is_modifiable && c.source_name == DEFAULT_SOURCE_NAME)
        })
        .or_else(|| calendars.iter().find(|c| c.is_modifiable))
}

pub struct CalendarMirror {
    calendar: Arc<dyn DeviceCalendar>,
    timezone: String,
}

impl CalendarMirror {
    pub fn new(calendar: Arc<dyn DeviceCalendar>, timezone: impl Into<String>) -> Self {
        Self {
            calendar,
            timezone: timezone.into(),
        }
    }

    /// Create one event for a reminder. Every failure is logged and yields `None`.
    pub async fn mirror_event(
        &self,
        title: &str,
        start: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Option<String> {
        match self.try_mirror(title, start, notes).await {
            Ok(Some(event_id)) => {
                tracing::debug!(event_id = event_id.as_str(), %start, "calendar event created");
                Some(event_id)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, %start, "error creating calendar event");
                None
            }
        }
    }

    pub async fn mirror_many(
        &self,
        title: &str,
        starts: &[DateTime<Utc>],
        notes: Option<&str>,
    ) -> Vec<Option<String>> {
        join_all(
            starts
                .iter()
                .map(|start| self.mirror_event(title, *start, notes)),
        )
        .await
    }

    async fn try_mirror(
        &self,
        title: &str,
        start: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Result<Option<String>, CalendarError> {
        // The grant is re-checked on every call; it can be revoked at any time.
        if !self.calendar.request_permission().await? {
            tracing::info!("calendar permission denied");
            return Ok(None);
        }

        let calendars = self.calendar.list_calendars().await?;
        let Some(destination) = select_calendar(&calendars) else {
            tracing::info!("no writable calendar found");
            return Ok(None);
        };

        let event = EventDraft::reminder(title, start, notes, &self.timezone);
        let event_id = self.calendar.create_event(&destination.id, event).await?;
        Ok(Some(event_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCalendar;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn info(id: &str, is_primary: bool, is_modifiable: bool, source: &str) -> CalendarInfo {
        CalendarInfo {
            id: id.into(),
            is_primary,
            is_modifiable,
            source_name: source.into(),
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap()
    }

    #[test]
    fn prefers_primary_modifiable_calendar() {
        let calendars = vec![
            info("holidays", false, false, "Subscribed"),
            info("work", false, true, "Exchange"),
            info("primary-ro", true, false, "Google"),
            info("primary", true, true, "Google"),
        ];
        assert_eq!(select_calendar(&calendars).unwrap().id, "primary");
    }

    #[test]
    fn default_source_counts_as_primary() {
        let calendars = vec![
            info("work", false, true, "Exchange"),
            info("device", false, true, "Default"),
        ];
        assert_eq!(select_calendar(&calendars).unwrap().id, "device");
    }

    #[test]
    fn falls_back_to_first_modifiable() {
        let calendars = vec![
            info("holidays", false, false, "Subscribed"),
            info("work", false, true, "Exchange"),
            info("home", false, true, "iCloud"),
        ];
        assert_eq!(select_calendar(&calendars).unwrap().id, "work");
        assert!(select_calendar(&calendars[..1]).is_none());
    }

    #[test]
    fn reminder_event_lasts_an_hour_with_two_alarms() {
        let event = EventDraft::reminder("Water sample", start(), Some("Tap 3"), "Europe/Berlin");
        assert_eq!(event.end - event.start, Duration::hours(1));
        let offsets: Vec<i64> = event
            .alarms
            .iter()
            .map(|a| a.relative_offset_minutes)
            .collect();
        assert_eq!(offsets, vec![0, -15]);
        assert_eq!(event.timezone, "Europe/Berlin");
    }

    #[tokio::test]
    async fn no_modifiable_calendar_yields_none() {
        let calendar = Arc::new(FakeCalendar::new(vec![info("ro", true, false, "Google")]));
        let mirror = CalendarMirror::new(calendar.clone(), "UTC");

        assert_eq!(mirror.mirror_event("Swab", start(), None).await, None);
        assert!(calendar.events().is_empty());
    }

    #[tokio::test]
    async fn permission_is_checked_on_every_call() {
        let calendar = Arc::new(FakeCalendar::new(vec![info("main", true, true, "Local")]));
        let mirror = CalendarMirror::new(calendar.clone(), "UTC");

        assert!(mirror.mirror_event("Swab", start(), None).await.is_some());
        calendar.set_permission(false);
        assert_eq!(mirror.mirror_event("Swab", start(), None).await, None);

        assert_eq!(calendar.permission_requests(), 2);
        assert_eq!(calendar.events().len(), 1);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_none() {
        let calendar = Arc::new(
            FakeCalendar::new(vec![info("main", true, true, "Local")]).failing_creates(),
        );
        let mirror = CalendarMirror::new(calendar, "UTC");

        let results = mirror
            .mirror_many("Swab", &[start(), start() + Duration::days(1)], None)
            .await;
        assert_eq!(results, vec![None, None]);
    }

    #[tokio::test]
    async fn creates_event_in_selected_calendar() {
        let calendar = Arc::new(FakeCalendar::new(vec![
            info("work", false, true, "Exchange"),
            info("main", true, true, "Google"),
        ]));
        let mirror = CalendarMirror::new(calendar.clone(), "UTC");

        let id = mirror
            .mirror_event("Swab", start(), Some("bench 2"))
            .await
            .expect("event id");

        let events = calendar.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "main");
        assert_eq!(events[0].1.notes.as_deref(), Some("bench 2"));
        assert!(id.starts_with("evt-"));
    }
}
