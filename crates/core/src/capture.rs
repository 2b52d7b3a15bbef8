use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::TaskCategory;

/// Owner recorded on tasks created without a signed-in user.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Normalized input for creating a task from any client (CLI, embedding host).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub category: TaskCategory,
    pub user_id: Option<String>,
    pub reminder_times: Vec<DateTime<Utc>>,
    pub sync_calendar: bool,
}

impl TaskInput {
    pub fn require_title(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(())
    }

    pub fn owner(&self) -> String {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(ANONYMOUS_USER)
            .to_string()
    }

    pub fn normalized_description(&self) -> Option<String> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyTitle,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "Please enter a task name"),
        }
    }
}

impl std::error::Error for ValidationError {}
