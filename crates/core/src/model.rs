use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled follow-up check on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub date: DateTime<Utc>,
    pub is_completed: bool,
}

impl Reminder {
    /// A fresh, incomplete reminder whose id is the epoch-millisecond timestamp.
    pub fn scheduled_at(date: DateTime<Utc>) -> Self {
        Self {
            id: date.timestamp_millis().to_string(),
            date,
            is_completed: false,
        }
    }

    pub fn is_pending_after(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && self.date > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Microbiology,
    General,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Microbiology => "microbiology",
            CategoryKind::General => "general",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of a task. Lab-specific fields only exist on the microbiology variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskCategory {
    #[serde(rename_all = "camelCase")]
    Microbiology {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lab_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sample_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test_type: Option<String>,
    },
    General,
}

impl TaskCategory {
    pub fn microbiology() -> Self {
        TaskCategory::Microbiology {
            lab_id: None,
            sample_type: None,
            test_type: None,
        }
    }

    pub fn kind(&self) -> CategoryKind {
        match self {
            TaskCategory::Microbiology { .. } => CategoryKind::Microbiology,
            TaskCategory::General => CategoryKind::General,
        }
    }
}

impl Default for TaskCategory {
    fn default() -> Self {
        TaskCategory::microbiology()
    }
}

/// A task record as held by the remote store. Always carries its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: TaskCategory,
    pub created_at: DateTime<Utc>,
    pub reminders: Vec<Reminder>,
    pub is_completed: bool,
}

/// A task that has not been persisted yet, so it has no id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: TaskCategory,
    pub created_at: DateTime<Utc>,
    pub reminders: Vec<Reminder>,
    pub is_completed: bool,
}

impl NewTask {
    pub fn into_task(self, id: String) -> Task {
        Task {
            id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            category: self.category,
            created_at: self.created_at,
            reminders: self.reminders,
            is_completed: self.is_completed,
        }
    }
}

/// Partial update for a stored task. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<Reminder>>,
}

impl TaskPatch {
    pub fn completion(is_completed: bool) -> Self {
        Self {
            is_completed: Some(is_completed),
            ..Self::default()
        }
    }

    pub fn reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Some(reminders),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(done) = self.is_completed {
            task.is_completed = done;
        }
        if let Some(reminders) = &self.reminders {
            task.reminders = reminders.clone();
        }
    }
}
