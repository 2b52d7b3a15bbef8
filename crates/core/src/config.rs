use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::{BaseDirs, ProjectDirs};
use once_cell::sync::Lazy;

use crate::orchestrator::PERSIST_TIMEOUT;

static DEFAULT_DB_NAME: &str = "labtrack.sqlite3";
static DEFAULT_TIMEZONE: &str = "UTC";
static ENV_DATA_DIR: &str = "LABTRACK_DATA_DIR";
static ENV_USER: &str = "LABTRACK_USER";
static ENV_PERSIST_TIMEOUT_MS: &str = "LABTRACK_PERSIST_TIMEOUT_MS";
static ENV_TIMEZONE: &str = "LABTRACK_TIMEZONE";

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("dev", "labtrack", "labtrack"));

#[derive(Debug, Clone)]
pub struct AppConfig {
    data_dir: PathBuf,
    db_path: PathBuf,
    user_id: Option<String>,
    persist_timeout: Duration,
    calendar_timezone: String,
}

impl AppConfig {
    /// Construct [`AppConfig`] by resolving the data directory using the provided override,
    /// environment variables, and platform defaults.
    pub fn discover(data_dir_override: Option<PathBuf>) -> Result<Self> {
        let data_dir = resolve_data_dir(data_dir_override)?;
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).with_context(|| {
                format!("Failed to create data directory at {}", data_dir.display())
            })?;
        }
        let mut config = Self::from_data_dir(data_dir)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Construct [`AppConfig`] directly from a resolved data directory, with default settings.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let db_path = data_dir.join(DEFAULT_DB_NAME);
        Ok(Self {
            data_dir,
            db_path,
            user_id: None,
            persist_timeout: PERSIST_TIMEOUT,
            calendar_timezone: DEFAULT_TIMEZONE.to_string(),
        })
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        if user_id.is_some() {
            self.user_id = user_id;
        }
        self
    }

    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn persist_timeout(&self) -> Duration {
        self.persist_timeout
    }

    pub fn calendar_timezone(&self) -> &str {
        &self.calendar_timezone
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(user) = non_empty_env(ENV_USER) {
            self.user_id = Some(user);
        }
        if let Some(raw) = non_empty_env(ENV_PERSIST_TIMEOUT_MS) {
            let millis: u64 = raw
                .parse()
                .with_context(|| format!("{} must be a number of milliseconds", ENV_PERSIST_TIMEOUT_MS))?;
            self.persist_timeout = Duration::from_millis(millis);
        }
        if let Some(tz) = non_empty_env(ENV_TIMEZONE) {
            self.calendar_timezone = tz;
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn resolve_data_dir(data_dir_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = data_dir_override {
        return Ok(dir);
    }

    if let Ok(env_dir) = env::var(ENV_DATA_DIR) {
        return Ok(PathBuf::from(env_dir));
    }

    if cfg!(debug_assertions) {
        let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        let dev_dir = manifest_dir.join("..").join("tmp").join("dev-labtrack");
        return Ok(dev_dir);
    }

    if let Some(project) = &*PROJECT_DIRS {
        return Ok(project.data_dir().to_path_buf());
    }

    if let Some(base) = BaseDirs::new() {
        return Ok(base.home_dir().join(".labtrack"));
    }

    Ok(env::current_dir()?.join(".labtrack"))
}
