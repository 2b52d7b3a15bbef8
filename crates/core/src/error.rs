use thiserror::Error;

use crate::capture::ValidationError;

/// Failures raised by a [`TaskRecordStore`](crate::store::TaskRecordStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        StoreError::Backend(format!("{:#}", err))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("calendar backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("unknown reminder template '{0}'")]
    UnknownTemplate(String),
    #[error("reminder offset of {0} days is out of range")]
    OutOfRange(u32),
}

/// Outcome taxonomy for task creation.
///
/// `Validation` and `Persistence` fail the call. `NotificationScheduling` and
/// `CalendarSync` are only ever reported as warnings on a successful outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to persist task: {0}")]
    Persistence(#[source] StoreError),
    #[error("{failed} of {attempted} reminder notifications could not be scheduled")]
    NotificationScheduling {
        failed: usize,
        attempted: usize,
        errors: Vec<String>,
    },
    #[error("could not sync {failed} of {attempted} events to calendar")]
    CalendarSync { failed: usize, attempted: usize },
}
