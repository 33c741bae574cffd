use chrono::{DateTime, Duration, Months, Utc};

use crate::model::task::{RecurrencePattern, Task};
use crate::ops::task_ops::NewTask;

/// Advance `from` by `interval` steps of `pattern`.
///
/// Month and year steps clamp to the last day of the target month, so
/// 31 January + 1 month is 28 (or 29) February.
pub fn advance(
    from: DateTime<Utc>,
    pattern: RecurrencePattern,
    interval: u32,
) -> Option<DateTime<Utc>> {
    let interval = interval.max(1);
    match pattern {
        RecurrencePattern::Daily => from.checked_add_signed(Duration::days(interval as i64)),
        RecurrencePattern::Weekly => {
            from.checked_add_signed(Duration::weeks(interval as i64))
        }
        RecurrencePattern::Monthly => from.checked_add_months(Months::new(interval)),
        RecurrencePattern::Yearly => {
            from.checked_add_months(Months::new(interval.checked_mul(12)?))
        }
    }
}

/// Due date of the occurrence after `task`, counted from its due date or
/// from `now` when it has none.
pub fn next_due(task: &Task, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let pattern = task.recurrence_pattern?;
    advance(task.due_date.unwrap_or(now), pattern, task.recurrence_interval)
}

/// The task to create when a recurring task is completed.
///
/// Tracked time does not carry over.
pub fn next_occurrence(task: &Task, now: DateTime<Utc>) -> Option<NewTask> {
    if !task.is_recurring {
        return None;
    }
    let due = next_due(task, now)?;
    Some(NewTask {
        title: task.title.clone(),
        description: task.description.clone(),
        category_id: task.category_id,
        priority_id: task.priority_id,
        due_date: Some(due),
        estimated_time: task.estimated_time,
        actual_time: None,
        tags: task.tags.clone(),
        recurrence_pattern: task.recurrence_pattern,
        recurrence_interval: Some(task.recurrence_interval.max(1)),
        position: None,
    })
}

/// Human description: `Daily`, `Every 3 weeks`. Empty for one-off tasks.
pub fn describe(task: &Task) -> String {
    let Some(pattern) = task.recurrence_pattern.filter(|_| task.is_recurring) else {
        return String::new();
    };
    let interval = task.recurrence_interval.max(1);
    let (single, unit) = match pattern {
        RecurrencePattern::Daily => ("Daily", "days"),
        RecurrencePattern::Weekly => ("Weekly", "weeks"),
        RecurrencePattern::Monthly => ("Monthly", "months"),
        RecurrencePattern::Yearly => ("Yearly", "years"),
    };
    if interval == 1 {
        single.to_string()
    } else {
        format!("Every {} {}", interval, unit)
    }
}
