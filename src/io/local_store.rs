use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::atomic::atomic_write;
use crate::io::lock::FileLock;
use crate::io::store::{Store, StoreError, StoreResult};
use crate::model::category::{Category, Priority};
use crate::model::task::Task;
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::{CategoryPatch, PriorityPatch};
use crate::ops::task_ops::{TaskPatch, apply_patch};
use crate::ops::time_ops::{StopPatch, apply_stop, sort_entries};

/// A row kept in one of the local JSON tables
pub trait Record: Serialize + DeserializeOwned + Clone {
    const FILE: &'static str;
    const TABLE: &'static str;

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    fn owner(&self) -> &str;
}

impl Record for Task {
    const FILE: &'static str = "tasks.json";
    const TABLE: &'static str = "task";

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
}

impl Record for Category {
    const FILE: &'static str = "categories.json";
    const TABLE: &'static str = "category";

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
}

impl Record for Priority {
    const FILE: &'static str = "priorities.json";
    const TABLE: &'static str = "priority";

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
}

impl Record for TimeEntry {
    const FILE: &'static str = "time_entries.json";
    const TABLE: &'static str = "time entry";

    fn id(&self) -> i64 {
        self.id
    }
    fn set_id(&mut self, id: i64) {
        self.id = id;
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
}

/// JSON-file store: one array per table, shared by every local user.
///
/// Writes hold the directory lock and replace files atomically.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Self {
        LocalStore { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path<R: Record>(&self) -> PathBuf {
        self.dir.join(R::FILE)
    }

    /// All rows of a table. A missing file is an empty table.
    fn load_all<R: Record>(&self) -> StoreResult<Vec<R>> {
        let path = self.path::<R>();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Read { path, source: e }),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "data file is corrupt");
            StoreError::Corrupt { path, source: e }
        })
    }

    fn save_all<R: Record>(&self, rows: &[R]) -> StoreResult<()> {
        let path = self.path::<R>();
        let mut json = serde_json::to_string_pretty(rows).map_err(StoreError::Decode)?;
        json.push('\n');
        atomic_write(&path, json.as_bytes()).map_err(|e| StoreError::Write { path, source: e })
    }

    fn load_owned<R: Record>(&self, user_id: &str) -> StoreResult<Vec<R>> {
        Ok(self
            .load_all::<R>()?
            .into_iter()
            .filter(|r| r.owner() == user_id)
            .collect())
    }

    /// Load a table, change it under the lock, write it back.
    fn mutate<R, T, F>(&self, f: F) -> StoreResult<T>
    where
        R: Record,
        F: FnOnce(&mut Vec<R>) -> StoreResult<T>,
    {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Write {
            path: self.dir.clone(),
            source: e,
        })?;
        let _lock = FileLock::acquire_default(&self.dir)?;
        let mut rows = self.load_all::<R>()?;
        let out = f(&mut rows)?;
        self.save_all(&rows)?;
        Ok(out)
    }

    fn insert<R: Record>(&self, mut record: R) -> StoreResult<R> {
        self.mutate(|rows: &mut Vec<R>| {
            let id = rows.iter().map(Record::id).max().map_or(1, |m| m + 1);
            record.set_id(id);
            rows.push(record.clone());
            tracing::debug!(table = R::TABLE, id, "inserted");
            Ok(record)
        })
    }

    fn update<R, F>(&self, user_id: &str, id: i64, f: F) -> StoreResult<R>
    where
        R: Record,
        F: FnOnce(&mut R),
    {
        self.mutate(|rows: &mut Vec<R>| {
            let row = rows
                .iter_mut()
                .find(|r| r.id() == id && r.owner() == user_id)
                .ok_or(StoreError::NotFound { table: R::TABLE, id })?;
            f(row);
            Ok(row.clone())
        })
    }

    fn delete<R: Record>(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.mutate(|rows: &mut Vec<R>| {
            let before = rows.len();
            rows.retain(|r| !(r.id() == id && r.owner() == user_id));
            if rows.len() == before {
                return Err(StoreError::NotFound { table: R::TABLE, id });
            }
            tracing::debug!(table = R::TABLE, id, "deleted");
            Ok(())
        })
    }
}

impl Store for LocalStore {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn list_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        self.load_owned(user_id)
    }

    fn insert_task(&self, task: Task) -> StoreResult<Task> {
        self.insert(task)
    }

    fn update_task(
        &self,
        user_id: &str,
        id: i64,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Task> {
        self.update(user_id, id, |t: &mut Task| apply_patch(t, patch, now))
    }

    fn delete_task(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete::<Task>(user_id, id)
    }

    /// One locked write for the whole batch
    fn set_positions(
        &self,
        user_id: &str,
        positions: &[(i64, i64)],
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.mutate(|rows: &mut Vec<Task>| {
            for (id, position) in positions {
                let task = rows
                    .iter_mut()
                    .find(|t| t.id == *id && t.user_id == user_id)
                    .ok_or(StoreError::NotFound {
                        table: Task::TABLE,
                        id: *id,
                    })?;
                task.position = *position;
                task.updated_at = Some(now);
            }
            Ok(())
        })
    }

    fn list_categories(&self, user_id: &str) -> StoreResult<Vec<Category>> {
        self.load_owned(user_id)
    }

    fn insert_category(&self, category: Category) -> StoreResult<Category> {
        self.insert(category)
    }

    fn update_category(
        &self,
        user_id: &str,
        id: i64,
        patch: &CategoryPatch,
    ) -> StoreResult<Category> {
        self.update(user_id, id, |c: &mut Category| patch.apply(c))
    }

    fn delete_category(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete::<Category>(user_id, id)
    }

    fn list_priorities(&self, user_id: &str) -> StoreResult<Vec<Priority>> {
        self.load_owned(user_id)
    }

    fn insert_priority(&self, priority: Priority) -> StoreResult<Priority> {
        self.insert(priority)
    }

    fn update_priority(
        &self,
        user_id: &str,
        id: i64,
        patch: &PriorityPatch,
    ) -> StoreResult<Priority> {
        self.update(user_id, id, |p: &mut Priority| patch.apply(p))
    }

    fn delete_priority(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete::<Priority>(user_id, id)
    }

    fn list_time_entries(&self, user_id: &str) -> StoreResult<Vec<TimeEntry>> {
        let mut entries = self.load_owned(user_id)?;
        sort_entries(&mut entries);
        Ok(entries)
    }

    fn insert_time_entry(&self, entry: TimeEntry) -> StoreResult<TimeEntry> {
        self.insert(entry)
    }

    fn stop_time_entry(
        &self,
        user_id: &str,
        id: i64,
        patch: &StopPatch,
    ) -> StoreResult<TimeEntry> {
        self.update(user_id, id, |e: &mut TimeEntry| apply_stop(e, patch))
    }

    fn delete_time_entry(&self, user_id: &str, id: i64) -> StoreResult<()> {
        self.delete::<TimeEntry>(user_id, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::task_ops::{NewTask, build_task};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn store(tmp: &TempDir) -> LocalStore {
        LocalStore::new(tmp.path().join("data"))
    }

    fn task(user: &str, title: &str) -> Task {
        build_task(NewTask::titled(title), 0, user, 0, now()).unwrap()
    }

    #[test]
    fn test_missing_files_are_empty() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        assert!(s.list_tasks("u1").unwrap().is_empty());
        assert!(s.list_categories("u1").unwrap().is_empty());
        assert!(!s.dir().exists());
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let a = s.insert_task(task("u1", "a")).unwrap();
        let b = s.insert_task(task("u2", "b")).unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        s.delete_task("u1", 1).unwrap();
        let c = s.insert_task(task("u1", "c")).unwrap();
        assert_eq!(c.id, 3);
    }

    #[test]
    fn test_scoped_by_user() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        s.insert_task(task("u1", "mine")).unwrap();
        let theirs = s.insert_task(task("u2", "theirs")).unwrap();

        let mine: Vec<String> = s.list_tasks("u1").unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(mine, vec!["mine".to_string()]);

        let patch = TaskPatch {
            title: Some("stolen".into()),
            ..Default::default()
        };
        assert!(matches!(
            s.update_task("u1", theirs.id, &patch, now()),
            Err(StoreError::NotFound { .. })
        ));
        assert!(s.delete_task("u1", theirs.id).is_err());
        assert_eq!(s.list_tasks("u2").unwrap().len(), 1);
    }

    #[test]
    fn test_update_merges_and_persists() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let mut t = task("u1", "write");
        t.tags = vec!["work".into()];
        let t = s.insert_task(t).unwrap();

        let patch = TaskPatch {
            is_done: Some(true),
            ..Default::default()
        };
        let updated = s.update_task("u1", t.id, &patch, now()).unwrap();
        assert!(updated.is_done);

        let reloaded = LocalStore::new(s.dir().to_path_buf());
        let stored = &reloaded.list_tasks("u1").unwrap()[0];
        assert_eq!(stored.tags, vec!["work".to_string()]);
        assert_eq!(stored.completed_at, Some(now()));
        assert_eq!(stored.updated_at, Some(now()));
    }

    #[test]
    fn test_set_positions() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let a = s.insert_task(task("u1", "a")).unwrap();
        let b = s.insert_task(task("u1", "b")).unwrap();
        s.set_positions("u1", &[(b.id, 0), (a.id, 1)], now()).unwrap();
        let tasks = s.list_tasks("u1").unwrap();
        assert_eq!(tasks.iter().find(|t| t.id == b.id).unwrap().position, 0);
        assert_eq!(tasks.iter().find(|t| t.id == a.id).unwrap().position, 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        fs::create_dir_all(s.dir()).unwrap();
        fs::write(s.dir().join("tasks.json"), "{not json").unwrap();
        assert!(matches!(s.list_tasks("u1"), Err(StoreError::Corrupt { .. })));
        // a failed load never overwrites the file
        assert!(s.insert_task(task("u1", "x")).is_err());
        assert_eq!(
            fs::read_to_string(s.dir().join("tasks.json")).unwrap(),
            "{not json"
        );
    }

    #[test]
    fn test_time_entries_newest_first_and_stop() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp);
        let entry = |start: DateTime<Utc>| TimeEntry {
            id: 0,
            task_id: 1,
            user_id: "u1".into(),
            start_time: start,
            end_time: None,
            duration: None,
            description: None,
            created_at: start,
        };
        s.insert_time_entry(entry(now() - chrono::Duration::hours(2))).unwrap();
        let running = s.insert_time_entry(entry(now() - chrono::Duration::minutes(20))).unwrap();

        let entries = s.list_time_entries("u1").unwrap();
        assert_eq!(entries[0].id, running.id);

        let stopped = s
            .stop_time_entry(
                "u1",
                running.id,
                &StopPatch {
                    end_time: now(),
                    duration: 20,
                },
            )
            .unwrap();
        assert_eq!(stopped.duration, Some(20));
        assert!(!stopped.is_running());
    }
}
