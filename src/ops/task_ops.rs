use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::model::task::{RecurrencePattern, Task};

static COLOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid colour regex")
});

/// Input rejected before it reaches a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),
    #[error("a category named '{0}' already exists")]
    DuplicateName(String),
    #[error("invalid colour '{0}' (expected #rrggbb)")]
    InvalidColor(String),
    #[error("invalid date '{0}' (expected YYYY-MM-DD or RFC 3339)")]
    InvalidDate(String),
    #[error("recurrence interval must be at least 1")]
    InvalidInterval,
    #[error("invalid e-mail address '{0}'")]
    InvalidEmail(String),
}

/// Trimmed, non-empty title
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let t = title.trim();
    if t.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(t.to_string())
}

/// Trimmed, non-empty name for a category or priority
pub fn validate_name(kind: &'static str, name: &str) -> Result<String, ValidationError> {
    let n = name.trim();
    if n.is_empty() {
        return Err(ValidationError::EmptyName(kind));
    }
    Ok(n.to_string())
}

pub fn validate_color(color: &str) -> Result<String, ValidationError> {
    let c = color.trim();
    if !COLOR_RE.is_match(c) {
        return Err(ValidationError::InvalidColor(color.to_string()));
    }
    Ok(c.to_lowercase())
}

/// Trimmed, non-empty, de-duplicated, in first-seen order
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let t = tag.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

fn normalize_description(d: Option<&str>) -> Option<String> {
    d.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Fields supplied when creating a task
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub priority_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_time: Option<u32>,
    pub actual_time: Option<u32>,
    pub tags: Vec<String>,
    pub recurrence_pattern: Option<RecurrencePattern>,
    pub recurrence_interval: Option<u32>,
    /// Explicit position; otherwise one past the owner's current maximum
    pub position: Option<i64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..Default::default()
        }
    }
}

/// Position for a new task: one past the highest existing position
pub fn next_position(existing: &[Task]) -> i64 {
    existing.iter().map(|t| t.position).max().map_or(0, |p| p + 1)
}

/// Validate `new` and build the stored record. `id` and `position` are
/// assigned by the store.
pub fn build_task(
    new: NewTask,
    id: i64,
    user_id: &str,
    position: i64,
    now: DateTime<Utc>,
) -> Result<Task, ValidationError> {
    let title = validate_title(&new.title)?;
    let interval = new.recurrence_interval.unwrap_or(1);
    if interval == 0 {
        return Err(ValidationError::InvalidInterval);
    }
    Ok(Task {
        id,
        user_id: user_id.to_string(),
        title,
        description: normalize_description(new.description.as_deref()),
        is_done: false,
        category_id: new.category_id.filter(|id| *id != 0),
        priority_id: new.priority_id.filter(|id| *id != 0),
        due_date: new.due_date,
        completed_at: None,
        estimated_time: new.estimated_time,
        actual_time: new.actual_time.filter(|m| *m > 0),
        tags: normalize_tags(&new.tags),
        is_recurring: new.recurrence_pattern.is_some(),
        recurrence_pattern: new.recurrence_pattern,
        recurrence_interval: interval,
        position: new.position.unwrap_or(position),
        created_at: now,
        updated_at: None,
    })
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Update instruction for an optional field
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    Keep,
    Set(T),
    Clear,
}

impl<T> Default for Change<T> {
    fn default() -> Self {
        Change::Keep
    }
}

impl<T: Clone> Change<T> {
    fn apply(&self, slot: &mut Option<T>) {
        match self {
            Change::Keep => {}
            Change::Set(v) => *slot = Some(v.clone()),
            Change::Clear => *slot = None,
        }
    }
}

impl<T: Serialize> Change<T> {
    fn write(&self, key: &str, body: &mut Map<String, Value>) {
        match self {
            Change::Keep => {}
            Change::Set(v) => {
                body.insert(key.to_string(), json!(v));
            }
            Change::Clear => {
                body.insert(key.to_string(), Value::Null);
            }
        }
    }
}

/// A partial field merge. Untouched fields keep their stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Change<String>,
    pub is_done: Option<bool>,
    pub category_id: Change<i64>,
    pub priority_id: Change<i64>,
    pub due_date: Change<DateTime<Utc>>,
    pub estimated_time: Change<u32>,
    pub actual_time: Change<u32>,
    pub tags: Option<Vec<String>>,
    pub recurrence_pattern: Change<RecurrencePattern>,
    pub recurrence_interval: Option<u32>,
    pub position: Option<i64>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    /// Normalize text fields and reject invalid values.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if let Some(title) = &self.title {
            self.title = Some(validate_title(title)?);
        }
        if let Change::Set(d) = &self.description {
            self.description = match normalize_description(Some(d)) {
                Some(d) => Change::Set(d),
                None => Change::Clear,
            };
        }
        if let Some(tags) = &self.tags {
            self.tags = Some(normalize_tags(tags));
        }
        if self.recurrence_interval == Some(0) {
            return Err(ValidationError::InvalidInterval);
        }
        Ok(self)
    }

    /// JSON body for a table API `PATCH`: set fields, `null` for cleared ones.
    pub fn to_json(&self, now: DateTime<Utc>) -> Map<String, Value> {
        let mut body = Map::new();
        if let Some(title) = &self.title {
            body.insert("title".into(), json!(title));
        }
        self.description.write("description", &mut body);
        if let Some(done) = self.is_done {
            body.insert("is_done".into(), json!(done));
            body.insert(
                "completed_at".into(),
                if done { json!(now) } else { Value::Null },
            );
        }
        self.category_id.write("category_id", &mut body);
        self.priority_id.write("priority_id", &mut body);
        self.due_date.write("due_date", &mut body);
        self.estimated_time.write("estimated_time", &mut body);
        self.actual_time.write("actual_time", &mut body);
        if let Some(tags) = &self.tags {
            body.insert("tags".into(), json!(tags));
        }
        self.recurrence_pattern.write("recurrence_pattern", &mut body);
        match &self.recurrence_pattern {
            Change::Set(_) => {
                body.insert("is_recurring".into(), json!(true));
            }
            Change::Clear => {
                body.insert("is_recurring".into(), json!(false));
            }
            Change::Keep => {}
        }
        if let Some(interval) = self.recurrence_interval {
            body.insert("recurrence_interval".into(), json!(interval));
        }
        if let Some(position) = self.position {
            body.insert("position".into(), json!(position));
        }
        body.insert("updated_at".into(), json!(now));
        body
    }
}

/// Merge `patch` into `task` in place.
///
/// `completed_at` is stamped on a not-done → done transition and cleared on
/// done → not-done; `due_date` is never touched by completion.
pub fn apply_patch(task: &mut Task, patch: &TaskPatch, now: DateTime<Utc>) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    patch.description.apply(&mut task.description);
    if let Some(done) = patch.is_done {
        if done && !task.is_done {
            task.completed_at = Some(now);
        } else if !done {
            task.completed_at = None;
        }
        task.is_done = done;
    }
    patch.category_id.apply(&mut task.category_id);
    patch.priority_id.apply(&mut task.priority_id);
    patch.due_date.apply(&mut task.due_date);
    patch.estimated_time.apply(&mut task.estimated_time);
    patch.actual_time.apply(&mut task.actual_time);
    if let Some(tags) = &patch.tags {
        task.tags = tags.clone();
    }
    patch.recurrence_pattern.apply(&mut task.recurrence_pattern);
    task.is_recurring = task.recurrence_pattern.is_some();
    if let Some(interval) = patch.recurrence_interval {
        task.recurrence_interval = interval;
    }
    if let Some(position) = patch.position {
        task.position = position;
    }
    task.updated_at = Some(now);
}

/// Flip the completion flag
pub fn toggle(task: &Task) -> TaskPatch {
    TaskPatch {
        is_done: Some(!task.is_done),
        ..Default::default()
    }
}

/// Copy of a task as a new, not-done task titled `"<title> (Copy)"`
pub fn duplicate(task: &Task) -> NewTask {
    NewTask {
        title: format!("{} (Copy)", task.title),
        description: task.description.clone(),
        category_id: task.category_id,
        priority_id: task.priority_id,
        due_date: task.due_date,
        estimated_time: task.estimated_time,
        actual_time: task.actual_time,
        tags: task.tags.clone(),
        recurrence_pattern: task.recurrence_pattern,
        recurrence_interval: Some(task.recurrence_interval),
        position: None,
    }
}

/// `(id, position)` pairs placing tasks in the given order
pub fn reorder(ids: &[i64]) -> Vec<(i64, i64)> {
    ids.iter()
        .enumerate()
        .map(|(index, id)| (*id, index as i64))
        .collect()
}
