use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::calendar::{Alarm, CalendarInfo, EventDraft};
use crate::config::AppConfig;
use crate::model::{NewTask, Task, TaskCategory, TaskPatch};
use crate::notifications::NotificationRequest;

pub const LOCAL_CALENDAR_ID: &str = "local";

const TASK_COLUMNS: &str =
    "id, user_id, title, description, category, created_at, reminders, is_completed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredNotification {
    pub id: String,
    pub request: NotificationRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredEvent {
    pub id: String,
    pub calendar_id: String,
    pub event: EventDraft,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn initialize(config: &AppConfig) -> Result<Self> {
        Self::open(config.db_path())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to configure SQLite WAL mode")?;

        let db = Self { conn };
        db.apply_migrations()?;
        Ok(db)
    }

    pub fn insert_task(&self, id: &str, task: &NewTask) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO tasks (
                id, user_id, title, description, category, created_at, updated_at, reminders, is_completed
            ) VALUES (
                :id, :user_id, :title, :description, :category, :created_at, :updated_at, :reminders, :is_completed
            )",
            named_params![
                ":id": id,
                ":user_id": &task.user_id,
                ":title": &task.title,
                ":description": task.description.as_deref(),
                ":category": serde_json::to_string(&task.category)?,
                ":created_at": task.created_at.to_rfc3339(),
                ":updated_at": now,
                ":reminders": serde_json::to_string(&task.reminders)?,
                ":is_completed": task.is_completed,
            ],
        )?;
        Ok(())
    }

    /// Apply `patch` and return the owning user id, or `None` when the task is missing.
    pub fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Option<String>> {
        let Some(mut task) = self.fetch_task(id)? else {
            return Ok(None);
        };
        patch.apply_to(&mut task);

        self.conn.execute(
            "UPDATE tasks SET
                reminders = :reminders,
                is_completed = :is_completed,
                updated_at = :updated_at
             WHERE id = :id",
            named_params![
                ":reminders": serde_json::to_string(&task.reminders)?,
                ":is_completed": task.is_completed,
                ":updated_at": Utc::now().to_rfc3339(),
                ":id": id,
            ],
        )?;
        Ok(Some(task.user_id))
    }

    /// Delete a task and return its owning user id, or `None` when it did not exist.
    pub fn delete_task(&self, id: &str) -> Result<Option<String>> {
        let owner: Option<String> = self
            .conn
            .query_row(
                "SELECT user_id FROM tasks WHERE id = :id",
                named_params![":id": id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.is_some() {
            self.conn
                .execute("DELETE FROM tasks WHERE id = :id", named_params![":id": id])?;
        }
        Ok(owner)
    }

    pub fn fetch_task(&self, id: &str) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ? LIMIT 1", TASK_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(map_task(row)?))
        } else {
            Ok(None)
        }
    }

    /// Every task owned by `user_id`, oldest first.
    pub fn fetch_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = ? ORDER BY created_at ASC, rowid ASC",
            TASK_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([user_id])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task(row)?);
        }
        Ok(tasks)
    }

    pub fn insert_notification(&self, id: &str, request: &NotificationRequest) -> Result<()> {
        self.conn.execute(
            "INSERT INTO notifications (id, title, body, trigger_at, sound, created_at)
             VALUES (:id, :title, :body, :trigger_at, :sound, :created_at)",
            named_params![
                ":id": id,
                ":title": &request.title,
                ":body": &request.body,
                ":trigger_at": request.trigger_at.to_rfc3339(),
                ":sound": request.sound,
                ":created_at": Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn pending_notifications(&self) -> Result<Vec<StoredNotification>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, body, trigger_at, sound FROM notifications ORDER BY trigger_at ASC, rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            pending.push(StoredNotification {
                id: row.get(0)?,
                request: NotificationRequest {
                    title: row.get(1)?,
                    body: row.get(2)?,
                    trigger_at: parse_datetime_required(row.get::<_, String>(3)?)?,
                    sound: row.get(4)?,
                },
            });
        }
        Ok(pending)
    }

    pub fn clear_notifications(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM notifications", [])?)
    }

    pub fn list_calendars(&self) -> Result<Vec<CalendarInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, is_primary, is_modifiable, source_name FROM calendars ORDER BY rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut calendars = Vec::new();
        while let Some(row) = rows.next()? {
            calendars.push(CalendarInfo {
                id: row.get(0)?,
                is_primary: row.get(1)?,
                is_modifiable: row.get(2)?,
                source_name: row.get(3)?,
            });
        }
        Ok(calendars)
    }

    pub fn insert_event(&self, id: &str, calendar_id: &str, event: &EventDraft) -> Result<()> {
        let known: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM calendars WHERE id = :id AND is_modifiable = 1)",
            named_params![":id": calendar_id],
            |row| row.get(0),
        )?;
        if !known {
            return Err(anyhow!("Calendar '{}' is not writable", calendar_id));
        }

        self.conn.execute(
            "INSERT INTO calendar_events (id, calendar_id, title, start_at, end_at, notes, alarms, timezone)
             VALUES (:id, :calendar_id, :title, :start_at, :end_at, :notes, :alarms, :timezone)",
            named_params![
                ":id": id,
                ":calendar_id": calendar_id,
                ":title": &event.title,
                ":start_at": event.start.to_rfc3339(),
                ":end_at": event.end.to_rfc3339(),
                ":notes": event.notes.as_deref(),
                ":alarms": serde_json::to_string(&event.alarms)?,
                ":timezone": &event.timezone,
            ],
        )?;
        Ok(())
    }

    pub fn list_events(&self) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, calendar_id, title, start_at, end_at, notes, alarms, timezone
             FROM calendar_events ORDER BY start_at ASC, rowid ASC",
        )?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            let alarms: Vec<Alarm> = serde_json::from_str(&row.get::<_, String>(6)?)
                .context("Failed to parse event alarms")?;
            events.push(StoredEvent {
                id: row.get(0)?,
                calendar_id: row.get(1)?,
                event: EventDraft {
                    title: row.get(2)?,
                    start: parse_datetime_required(row.get::<_, String>(3)?)?,
                    end: parse_datetime_required(row.get::<_, String>(4)?)?,
                    notes: row.get(5)?,
                    alarms,
                    timezone: row.get(7)?,
                },
            });
        }
        Ok(events)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn apply_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                category TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                reminders TEXT NOT NULL DEFAULT '[]',
                is_completed INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id);
             CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                trigger_at TEXT NOT NULL,
                sound INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS calendars (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                is_modifiable INTEGER NOT NULL DEFAULT 1,
                source_name TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS calendar_events (
                id TEXT PRIMARY KEY,
                calendar_id TEXT NOT NULL REFERENCES calendars(id),
                title TEXT NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                notes TEXT,
                alarms TEXT NOT NULL DEFAULT '[]',
                timezone TEXT NOT NULL
             );
             INSERT OR IGNORE INTO calendars (id, title, is_primary, is_modifiable, source_name)
                VALUES ('local', 'Local', 1, 1, 'Local');
            ",
        )?;
        Ok(())
    }
}

fn map_task(row: &Row<'_>) -> Result<Task> {
    let category: TaskCategory = serde_json::from_str(&row.get::<_, String>(4)?)
        .context("Failed to parse task category")?;
    let reminders = serde_json::from_str(&row.get::<_, String>(6)?)
        .context("Failed to parse task reminders")?;

    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category,
        created_at: parse_datetime_required(row.get::<_, String>(5)?)?,
        reminders,
        is_completed: row.get(7)?,
    })
}

fn parse_datetime_required(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse timestamp '{}': {}", raw, e))
}
