pub mod calendar;
pub mod capture;
pub mod clock;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod notifications;
pub mod orchestrator;
pub mod parser;
pub mod schedule;
pub mod services;
pub mod store;
pub mod templates;
pub mod view_model;

#[cfg(test)]
mod testing;

pub use capture::TaskInput;
pub use commands::{preview_reminders, DeleteResult, Workspace};
pub use config::AppConfig;
pub use database::Database;
pub use error::{StoreError, TaskError};
pub use model::*;
pub use orchestrator::{CreateOutcome, CreateStatus, TaskOrchestrator};
pub use schedule::{CustomSchedule, Selection};
pub use view_model::TaskViewModel;
