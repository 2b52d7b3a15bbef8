use async_trait::async_trait;
use ulid::Ulid;

use super::{with_db, SharedDatabase};
use crate::calendar::{CalendarInfo, DeviceCalendar, EventDraft};
use crate::database::StoredEvent;
use crate::error::CalendarError;

/// Device calendar kept in the local database, with a single writable "Local" calendar.
pub struct LocalCalendar {
    db: SharedDatabase,
}

impl LocalCalendar {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub async fn events(&self) -> Result<Vec<StoredEvent>, CalendarError> {
        with_db(self.db.clone(), |db| db.list_events())
            .await
            .map_err(backend)
    }
}

fn backend(err: anyhow::Error) -> CalendarError {
    CalendarError::Backend(format!("{:#}", err))
}

#[async_trait]
impl DeviceCalendar for LocalCalendar {
    async fn request_permission(&self) -> Result<bool, CalendarError> {
        Ok(true)
    }

    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        with_db(self.db.clone(), |db| db.list_calendars())
            .await
            .map_err(backend)
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        event: EventDraft,
    ) -> Result<String, CalendarError> {
        let id = Ulid::new().to_string();
        let event_id = id.clone();
        let calendar_id = calendar_id.to_string();
        with_db(self.db.clone(), move |db| {
            db.insert_event(&event_id, &calendar_id, &event)
        })
        .await
        .map_err(backend)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::calendar::CalendarMirror;
    use crate::database::LOCAL_CALENDAR_ID;
    use crate::services::test_database;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn mirror_writes_into_local_calendar() {
        let (db, _dir) = test_database();
        let calendar = Arc::new(LocalCalendar::new(db));
        let mirror = CalendarMirror::new(calendar.clone(), "Europe/Berlin");
        let start = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();

        let id = mirror
            .mirror_event("Water sample", start, Some("tap 3"))
            .await
            .expect("event created");

        let events = calendar.events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
        assert_eq!(events[0].calendar_id, LOCAL_CALENDAR_ID);
        assert_eq!(events[0].event.end, start + Duration::minutes(60));
        assert_eq!(events[0].event.timezone, "Europe/Berlin");
        assert_eq!(events[0].event.notes.as_deref(), Some("tap 3"));
    }
}
