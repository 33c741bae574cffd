use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-defined grouping for tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// Display hint, `#rrggbb`
    pub color: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A user-defined urgency level for tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Priority {
    pub id: i64,
    pub name: String,
    /// Lower levels sort first
    pub level: i32,
    pub color: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
