use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::io::local_store::LocalStore;
use crate::io::lock::LockError;
use crate::io::remote_store::RemoteStore;
use crate::model::category::{Category, Priority};
use crate::model::config::{AppConfig, PersistenceMode};
use crate::model::session::Session;
use crate::model::task::Task;
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::{CategoryPatch, PriorityPatch};
use crate::ops::task_ops::TaskPatch;
use crate::ops::time_ops::StopPatch;

/// Error type for persistence calls
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("unexpected response from server: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("{table} {id} not found")]
    NotFound { table: &'static str, id: i64 },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("remote mode needs [remote] url and api_key in config.toml")]
    NotConfigured,
    #[error("not signed in to the remote backend (run `tf login <email>`)")]
    NoToken,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for one user's records.
///
/// Every call is scoped by the owning user id. Inserts ignore the id on the
/// record passed in and return the stored record with its assigned id.
/// Updates merge the given fields and never replace whole records.
pub trait Store {
    /// `"local"` or `"remote"`
    fn kind(&self) -> &'static str;

    // === Tasks ===

    fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>>;

    fn insert_task(&self, task: Task) -> StoreResult<Task>;

    fn update_task(
        &self,
        user_id: &str,
        id: i64,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Task>;

    fn delete_task(&self, user_id: &str, id: i64) -> StoreResult<()>;

    /// Write manual positions. The default issues one update per task.
    fn set_positions(
        &self,
        user_id: &str,
        positions: &[(i64, i64)],
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        for (id, position) in positions {
            let patch = TaskPatch {
                position: Some(*position),
                ..Default::default()
            };
            self.update_task(user_id, *id, &patch, now)?;
        }
        Ok(())
    }

    // === Categories ===

    fn list_categories(&self, user_id: &str) -> StoreResult<Vec<Category>>;

    fn insert_category(&self, category: Category) -> StoreResult<Category>;

    fn update_category(
        &self,
        user_id: &str,
        id: i64,
        patch: &CategoryPatch,
    ) -> StoreResult<Category>;

    fn delete_category(&self, user_id: &str, id: i64) -> StoreResult<()>;

    // === Priorities ===

    fn list_priorities(&self, user_id: &str) -> StoreResult<Vec<Priority>>;

    fn insert_priority(&self, priority: Priority) -> StoreResult<Priority>;

    fn update_priority(
        &self,
        user_id: &str,
        id: i64,
        patch: &PriorityPatch,
    ) -> StoreResult<Priority>;

    fn delete_priority(&self, user_id: &str, id: i64) -> StoreResult<()>;

    // === Time entries ===

    /// Newest first
    fn list_time_entries(&self, user_id: &str) -> StoreResult<Vec<TimeEntry>>;

    fn insert_time_entry(&self, entry: TimeEntry) -> StoreResult<TimeEntry>;

    fn stop_time_entry(&self, user_id: &str, id: i64, patch: &StopPatch)
    -> StoreResult<TimeEntry>;

    fn delete_time_entry(&self, user_id: &str, id: i64) -> StoreResult<()>;
}

/// Directory the local store keeps its JSON files in
pub fn data_dir(home: &Path) -> PathBuf {
    home.join("data")
}

/// Open the store selected by `config.mode`.
pub fn open_store(
    home: &Path,
    config: &AppConfig,
    session: Option<&Session>,
) -> StoreResult<Box<dyn Store>> {
    match config.mode {
        PersistenceMode::Local => {
            tracing::debug!(home = %home.display(), "opening local store");
            Ok(Box::new(LocalStore::new(data_dir(home))))
        }
        PersistenceMode::Remote => {
            let remote = config.remote.as_ref().ok_or(StoreError::NotConfigured)?;
            let token = session
                .and_then(|s| s.access_token.clone())
                .ok_or(StoreError::NoToken)?;
            tracing::debug!(url = %remote.url, "opening remote store");
            Ok(Box::new(RemoteStore::new(remote, token)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::RemoteConfig;
    use tempfile::TempDir;

    #[test]
    fn test_open_local_by_default() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(tmp.path(), &AppConfig::default(), None).unwrap();
        assert_eq!(store.kind(), "local");
    }

    #[test]
    fn test_remote_needs_config_and_token() {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig {
            mode: PersistenceMode::Remote,
            ..Default::default()
        };
        assert!(matches!(
            open_store(tmp.path(), &config, None),
            Err(StoreError::NotConfigured)
        ));

        config.remote = Some(RemoteConfig {
            url: "https://example.supabase.co".into(),
            api_key: "anon".into(),
            timeout_secs: 15,
        });
        let offline = Session::offline("a@example.com");
        assert!(matches!(
            open_store(tmp.path(), &config, Some(&offline)),
            Err(StoreError::NoToken)
        ));
    }
}
