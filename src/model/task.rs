use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How a recurring task repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RecurrencePattern {
    pub fn as_str(self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
            RecurrencePattern::Yearly => "yearly",
        }
    }

    /// Parse a pattern name (`daily`, `weekly`, `monthly`, `yearly`)
    pub fn parse_pattern(s: &str) -> Option<RecurrencePattern> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(RecurrencePattern::Daily),
            "weekly" => Some(RecurrencePattern::Weekly),
            "monthly" => Some(RecurrencePattern::Monthly),
            "yearly" => Some(RecurrencePattern::Yearly),
            _ => None,
        }
    }
}

/// A user-owned task record, as stored locally or returned by the table API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// Owning user; never changes after creation
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Estimated duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    /// Tracked duration in minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_time: Option<u32>,
    /// Free-text tags, unique, order not significant
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default = "default_interval")]
    pub recurrence_interval: u32,
    /// Advisory manual ordering; need not be contiguous or unique
    #[serde(default)]
    pub position: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

/// The table API sends `null` for an empty array column.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Task {
    /// Incomplete with a due date strictly before `now`
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_done && self.due_date.is_some_and(|due| due < now)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether time has been tracked against this task
    pub fn is_started(&self) -> bool {
        self.actual_time.is_some_and(|m| m > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{
            "id": 7,
            "user_id": "u1",
            "title": "Water plants",
            "created_at": "2025-05-01T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, 7);
        assert!(!task.is_done);
        assert!(task.tags.is_empty());
        assert_eq!(task.recurrence_interval, 1);
        assert_eq!(task.position, 0);
    }

    #[test]
    fn test_deserialize_null_tags_from_table_api() {
        let json = r#"{
            "id": 1,
            "user_id": "u1",
            "title": "t",
            "tags": null,
            "is_done": true,
            "recurrence_pattern": "weekly",
            "created_at": "2025-05-01T10:00:00.123456+00:00"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.tags.is_empty());
        assert_eq!(task.recurrence_pattern, Some(RecurrencePattern::Weekly));
    }

    #[test]
    fn test_parse_pattern() {
        assert_eq!(
            RecurrencePattern::parse_pattern("Monthly"),
            Some(RecurrencePattern::Monthly)
        );
        assert_eq!(RecurrencePattern::parse_pattern("hourly"), None);
    }
}
