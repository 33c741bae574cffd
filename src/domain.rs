use chrono::{DateTime, Utc};

use crate::io::store::{Store, StoreError};
use crate::model::category::{Category, Priority};
use crate::model::filter::{TaskFilter, TaskSort};
use crate::model::session::Session;
use crate::model::task::Task;
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::{
    Catalog, CategoryPatch, NewCategory, NewPriority, PriorityPatch, ensure_unique_category,
    resolve_category, resolve_priority, sort_priorities,
};
use crate::ops::dashboard::{Dashboard, dashboard};
use crate::ops::query::{QueryResult, query};
use crate::ops::recurrence::next_occurrence;
use crate::ops::task_ops::{
    Change, NewTask, TaskPatch, ValidationError, build_task, duplicate, next_position, reorder,
    toggle,
};
use crate::ops::time_ops::{NewTimeEntry, active_entry, stop};

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("no category matching '{0}'")]
    UnknownCategory(String),
    #[error("no priority matching '{0}'")]
    UnknownPriority(String),
    #[error("no timer is running")]
    NoActiveTimer,
    #[error("reorder needs each task id once; {0} is repeated")]
    DuplicateId(i64),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Result of flipping a task's completion flag
#[derive(Debug, Clone)]
pub struct Toggled {
    pub task: Task,
    /// Next occurrence created when a recurring task was completed
    pub next: Option<Task>,
}

/// Result of starting a timer
#[derive(Debug, Clone)]
pub struct StartedTimer {
    pub entry: TimeEntry,
    /// The timer that was running before, now stopped
    pub stopped: Option<StoppedTimer>,
}

#[derive(Debug, Clone)]
pub struct StoppedTimer {
    pub entry: TimeEntry,
    /// The task with its tracked time updated; `None` if it was deleted
    pub task: Option<Task>,
}

/// User-scoped task operations over a [`Store`].
///
/// Validation happens here, before any store call; filtering and sorting are
/// always done by the query engine, whatever the backend.
pub struct TaskDomain {
    store: Box<dyn Store>,
    session: Session,
}

impl TaskDomain {
    pub fn new(store: Box<dyn Store>, session: Session) -> Self {
        TaskDomain { store, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }

    fn user(&self) -> &str {
        self.session.user_id()
    }

    // === Tasks ===

    pub fn tasks(&self) -> DomainResult<Vec<Task>> {
        Ok(self.store.list_tasks(self.user())?)
    }

    pub fn find_task(&self, id: i64) -> DomainResult<Task> {
        self.tasks()?
            .into_iter()
            .find(|t| t.id == id)
            .ok_or(DomainError::Store(StoreError::NotFound { table: "task", id }))
    }

    /// Filtered, sorted tasks with stats over the filtered set
    pub fn query(
        &self,
        filter: &TaskFilter,
        sort: Option<&TaskSort>,
        now: DateTime<Utc>,
    ) -> DomainResult<QueryResult> {
        let tasks = self.tasks()?;
        let priorities = self.priorities()?;
        Ok(query(&tasks, filter, sort, &priorities, now))
    }

    pub fn add_task(&self, new: NewTask, now: DateTime<Utc>) -> DomainResult<Task> {
        let position = next_position(&self.tasks()?);
        let task = build_task(new, 0, self.user(), position, now)?;
        let task = self.store.insert_task(task)?;
        tracing::info!(id = task.id, "task created");
        Ok(task)
    }

    pub fn update_task(&self, id: i64, patch: TaskPatch, now: DateTime<Utc>) -> DomainResult<Task> {
        let patch = patch.validated()?;
        Ok(self.store.update_task(self.user(), id, &patch, now)?)
    }

    /// Flip completion. Completing a recurring task creates its next occurrence.
    pub fn toggle_task(&self, id: i64, now: DateTime<Utc>) -> DomainResult<Toggled> {
        let current = self.find_task(id)?;
        let task = self
            .store
            .update_task(self.user(), id, &toggle(&current), now)?;
        let next = match (task.is_done, next_occurrence(&task, now)) {
            (true, Some(new)) => Some(self.add_task(new, now)?),
            _ => None,
        };
        Ok(Toggled { task, next })
    }

    pub fn delete_task(&self, id: i64) -> DomainResult<()> {
        self.store.delete_task(self.user(), id)?;
        tracing::info!(id, "task deleted");
        Ok(())
    }

    pub fn duplicate_task(&self, id: i64, now: DateTime<Utc>) -> DomainResult<Task> {
        let original = self.find_task(id)?;
        self.add_task(duplicate(&original), now)
    }

    /// Give the listed tasks positions 0, 1, 2, … in that order.
    pub fn reorder(&self, ids: &[i64], now: DateTime<Utc>) -> DomainResult<()> {
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(DomainError::DuplicateId(*id));
            }
        }
        let tasks = self.tasks()?;
        if let Some(missing) = ids.iter().find(|id| !tasks.iter().any(|t| t.id == **id)) {
            return Err(StoreError::NotFound {
                table: "task",
                id: *missing,
            }
            .into());
        }
        Ok(self.store.set_positions(self.user(), &reorder(ids), now)?)
    }

    pub fn dashboard(&self, filter: &TaskFilter, now: DateTime<Utc>) -> DomainResult<Dashboard> {
        let result = self.query(filter, None, now)?;
        let catalog = self.catalog()?;
        Ok(dashboard(
            &result.tasks,
            &catalog.categories,
            &catalog.priorities,
            now,
        ))
    }

    // === Categories and priorities ===

    pub fn catalog(&self) -> DomainResult<Catalog> {
        Ok(Catalog {
            categories: self.categories()?,
            priorities: self.priorities()?,
        })
    }

    /// Sorted by name
    pub fn categories(&self) -> DomainResult<Vec<Category>> {
        let mut categories = self.store.list_categories(self.user())?;
        categories.sort_by_key(|c| c.name.to_lowercase());
        Ok(categories)
    }

    /// Sorted by level
    pub fn priorities(&self) -> DomainResult<Vec<Priority>> {
        let mut priorities = self.store.list_priorities(self.user())?;
        sort_priorities(&mut priorities);
        Ok(priorities)
    }

    pub fn resolve_category(&self, key: &str) -> DomainResult<Category> {
        resolve_category(&self.categories()?, key)
            .cloned()
            .ok_or_else(|| DomainError::UnknownCategory(key.to_string()))
    }

    pub fn resolve_priority(&self, key: &str) -> DomainResult<Priority> {
        resolve_priority(&self.priorities()?, key)
            .cloned()
            .ok_or_else(|| DomainError::UnknownPriority(key.to_string()))
    }

    pub fn add_category(&self, new: NewCategory, now: DateTime<Utc>) -> DomainResult<Category> {
        let new = new.validated()?;
        ensure_unique_category(&self.categories()?, &new.name, None)?;
        Ok(self.store.insert_category(new.build(0, self.user(), now))?)
    }

    pub fn update_category(&self, id: i64, patch: CategoryPatch) -> DomainResult<Category> {
        let patch = patch.validated()?;
        if let Some(name) = &patch.name {
            ensure_unique_category(&self.categories()?, name, Some(id))?;
        }
        Ok(self.store.update_category(self.user(), id, &patch)?)
    }

    /// Tasks keep their reference; it reads as `Uncategorized` from now on.
    pub fn delete_category(&self, id: i64) -> DomainResult<()> {
        Ok(self.store.delete_category(self.user(), id)?)
    }

    pub fn add_priority(&self, new: NewPriority, now: DateTime<Utc>) -> DomainResult<Priority> {
        let new = new.validated()?;
        Ok(self.store.insert_priority(new.build(0, self.user(), now))?)
    }

    pub fn update_priority(&self, id: i64, patch: PriorityPatch) -> DomainResult<Priority> {
        let patch = patch.validated()?;
        Ok(self.store.update_priority(self.user(), id, &patch)?)
    }

    pub fn delete_priority(&self, id: i64) -> DomainResult<()> {
        Ok(self.store.delete_priority(self.user(), id)?)
    }

    // === Time tracking ===

    /// Newest first, optionally for one task
    pub fn time_entries(&self, task_id: Option<i64>) -> DomainResult<Vec<TimeEntry>> {
        let entries = self.store.list_time_entries(self.user())?;
        Ok(match task_id {
            Some(id) => entries.into_iter().filter(|e| e.task_id == id).collect(),
            None => entries,
        })
    }

    pub fn active_timer(&self) -> DomainResult<Option<TimeEntry>> {
        Ok(active_entry(&self.time_entries(None)?).cloned())
    }

    /// Start timing a task, stopping whatever timer was running.
    pub fn start_timer(&self, new: NewTimeEntry, now: DateTime<Utc>) -> DomainResult<StartedTimer> {
        self.find_task(new.task_id)?;
        let stopped = match self.active_timer()? {
            Some(_) => Some(self.stop_timer(now)?),
            None => None,
        };
        let entry = TimeEntry {
            id: 0,
            task_id: new.task_id,
            user_id: self.user().to_string(),
            start_time: now,
            end_time: None,
            duration: None,
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            created_at: now,
        };
        let entry = self.store.insert_time_entry(entry)?;
        tracing::info!(task = entry.task_id, entry = entry.id, "timer started");
        Ok(StartedTimer { entry, stopped })
    }

    /// Stop the running timer and add its minutes to the task's tracked time.
    pub fn stop_timer(&self, now: DateTime<Utc>) -> DomainResult<StoppedTimer> {
        let running = self.active_timer()?.ok_or(DomainError::NoActiveTimer)?;
        let patch = stop(&running, now);
        let entry = self.store.stop_time_entry(self.user(), running.id, &patch)?;

        let task = match self.find_task(entry.task_id) {
            Ok(task) => {
                let tracked = task.actual_time.unwrap_or(0).saturating_add(patch.duration);
                let update = TaskPatch {
                    actual_time: Change::Set(tracked),
                    ..Default::default()
                };
                Some(self.store.update_task(self.user(), task.id, &update, now)?)
            }
            Err(DomainError::Store(StoreError::NotFound { .. })) => {
                tracing::warn!(task = entry.task_id, "timed task no longer exists");
                None
            }
            Err(e) => return Err(e),
        };
        tracing::info!(entry = entry.id, minutes = patch.duration, "timer stopped");
        Ok(StoppedTimer { entry, task })
    }

    pub fn delete_time_entry(&self, id: i64) -> DomainResult<()> {
        Ok(self.store.delete_time_entry(self.user(), id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::local_store::LocalStore;
    use crate::model::task::RecurrencePattern;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn domain(tmp: &TempDir, email: &str) -> TaskDomain {
        let store = LocalStore::new(tmp.path().join("data"));
        TaskDomain::new(Box::new(store), Session::offline(email))
    }

    #[test]
    fn test_add_assigns_next_position() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let a = d.add_task(NewTask::titled("a"), now()).unwrap();
        let b = d.add_task(NewTask::titled("b"), now()).unwrap();
        assert_eq!((a.position, b.position), (0, 1));
        assert_eq!(a.user_id, "ada@example.com");
    }

    #[test]
    fn test_add_rejects_blank_title_before_store() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let err = d.add_task(NewTask::titled("  "), now()).unwrap_err();
        assert!(matches!(err, DomainError::Invalid(ValidationError::EmptyTitle)));
        assert!(!tmp.path().join("data").exists());
    }

    #[test]
    fn test_users_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let ada = domain(&tmp, "ada@example.com");
        let bob = domain(&tmp, "bob@example.com");
        let t = ada.add_task(NewTask::titled("secret"), now()).unwrap();
        assert!(bob.tasks().unwrap().is_empty());
        assert!(bob.find_task(t.id).is_err());
        assert!(bob.delete_task(t.id).is_err());
    }

    #[test]
    fn test_toggle_recurring_creates_next() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let t = d
            .add_task(
                NewTask {
                    title: "Standup".into(),
                    due_date: Some(now()),
                    recurrence_pattern: Some(RecurrencePattern::Daily),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();

        let toggled = d.toggle_task(t.id, now()).unwrap();
        assert!(toggled.task.is_done);
        let next = toggled.next.unwrap();
        assert_eq!(next.due_date, Some(now() + Duration::days(1)));
        assert!(!next.is_done);

        // un-completing does not create another
        let again = d.toggle_task(t.id, now()).unwrap();
        assert!(!again.task.is_done);
        assert!(again.next.is_none());
        assert_eq!(d.tasks().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_and_reorder() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let a = d.add_task(NewTask::titled("a"), now()).unwrap();
        let copy = d.duplicate_task(a.id, now()).unwrap();
        assert_eq!(copy.title, "a (Copy)");
        assert_eq!(copy.position, 1);

        d.reorder(&[copy.id, a.id], now()).unwrap();
        assert_eq!(d.find_task(copy.id).unwrap().position, 0);
        assert_eq!(d.find_task(a.id).unwrap().position, 1);

        assert!(matches!(
            d.reorder(&[a.id, a.id], now()),
            Err(DomainError::DuplicateId(_))
        ));
        assert!(d.reorder(&[a.id, 999], now()).is_err());
    }

    #[test]
    fn test_category_names_unique() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let work = d
            .add_category(
                NewCategory {
                    name: "Work".into(),
                    color: "#3b82f6".into(),
                },
                now(),
            )
            .unwrap();
        let dup = d.add_category(
            NewCategory {
                name: " work ".into(),
                color: "#3b82f6".into(),
            },
            now(),
        );
        assert!(matches!(
            dup,
            Err(DomainError::Invalid(ValidationError::DuplicateName(_)))
        ));

        // another user may reuse the name
        let bob = domain(&tmp, "bob@example.com");
        assert!(
            bob.add_category(
                NewCategory {
                    name: "Work".into(),
                    color: "#3b82f6".into(),
                },
                now(),
            )
            .is_ok()
        );

        assert_eq!(d.resolve_category("WORK").unwrap().id, work.id);
        assert!(matches!(
            d.resolve_category("Home"),
            Err(DomainError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_timer_start_stop_adds_minutes() {
        let tmp = TempDir::new().unwrap();
        let d = domain(&tmp, "ada@example.com");
        let a = d.add_task(NewTask::titled("a"), now()).unwrap();
        let b = d.add_task(NewTask::titled("b"), now()).unwrap();

        let start = now();
        d.start_timer(
            NewTimeEntry {
                task_id: a.id,
                description: None,
            },
            start,
        )
        .unwrap();

        // starting on b stops a after 25 minutes
        let switched = d
            .start_timer(
                NewTimeEntry {
                    task_id: b.id,
                    description: Some("review".into()),
                },
                start + Duration::minutes(25),
            )
            .unwrap();
        let stopped = switched.stopped.unwrap();
        assert_eq!(stopped.entry.duration, Some(25));
        assert_eq!(stopped.task.unwrap().actual_time, Some(25));

        let done = d.stop_timer(start + Duration::minutes(40)).unwrap();
        assert_eq!(done.entry.task_id, b.id);
        assert_eq!(d.find_task(b.id).unwrap().actual_time, Some(15));
        assert!(d.active_timer().unwrap().is_none());
        assert!(matches!(
            d.stop_timer(start + Duration::minutes(41)),
            Err(DomainError::NoActiveTimer)
        ));
        assert_eq!(d.time_entries(Some(a.id)).unwrap().len(), 1);
    }
}
