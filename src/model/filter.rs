use serde::{Deserialize, Serialize};

/// Conjunctive set of optional task predicates.
///
/// Every field is independently optional and an absent field imposes no
/// constraint. An empty `search`, an empty `tags` list and an id of `0` are
/// treated as absent. Due-date bounds are kept as the raw text the caller
/// supplied; a bound that does not parse is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_overdue: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl TaskFilter {
    /// True when no predicate is present
    pub fn is_empty(&self) -> bool {
        self == &TaskFilter::default()
    }
}

/// Field a task list can be explicitly sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Title,
    CreatedAt,
    DueDate,
    Priority,
    Position,
}

impl SortField {
    pub fn parse_field(s: &str) -> Option<SortField> {
        match s {
            "title" => Some(SortField::Title),
            "created_at" | "created" => Some(SortField::CreatedAt),
            "due_date" | "due" => Some(SortField::DueDate),
            "priority" => Some(SortField::Priority),
            "position" => Some(SortField::Position),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Explicit sort directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSort {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl TaskSort {
    pub fn asc(field: SortField) -> Self {
        TaskSort {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        TaskSort {
            field,
            direction: SortDirection::Desc,
        }
    }
}
