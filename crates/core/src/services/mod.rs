//! SQLite-backed implementations of the host seams.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::config::AppConfig;
use crate::database::Database;

pub mod calendar;
pub mod notifications;
pub mod tasks;

pub use calendar::LocalCalendar;
pub use notifications::LocalNotificationQueue;
pub use tasks::SqliteTaskStore;

/// One connection shared by every local backend.
pub type SharedDatabase = Arc<Mutex<Database>>;

pub fn open_shared(config: &AppConfig) -> Result<SharedDatabase> {
    Ok(Arc::new(Mutex::new(Database::initialize(config)?)))
}

/// Run a database closure on the blocking pool.
pub(crate) async fn with_db<T, F>(db: SharedDatabase, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&db.lock()))
        .await
        .map_err(|err| anyhow!("blocking task failed: {}", err))?
}

#[cfg(test)]
pub(crate) fn test_database() -> (SharedDatabase, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
    let db = open_shared(&config).expect("database");
    (db, dir)
}
