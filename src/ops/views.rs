use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use indexmap::IndexMap;
use serde::Serialize;

use crate::model::category::{Category, Priority};
use crate::model::task::Task;

/// Colour used for columns with no backing record
pub const NEUTRAL_COLOR: &str = "#6b7280";
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const NO_PRIORITY: &str = "No Priority";

/// How a board is split into columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Status,
    Category,
    Priority,
}

impl GroupBy {
    pub fn parse_group(s: &str) -> Option<GroupBy> {
        match s {
            "status" => Some(GroupBy::Status),
            "category" => Some(GroupBy::Category),
            "priority" => Some(GroupBy::Priority),
            _ => None,
        }
    }
}

/// One board column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub color: String,
    pub tasks: Vec<Task>,
}

/// Split tasks into board columns, preserving task order within each column.
pub fn group_tasks(
    tasks: &[Task],
    by: GroupBy,
    categories: &[Category],
    priorities: &[Priority],
) -> Vec<Column> {
    match by {
        GroupBy::Status => group_by_status(tasks),
        GroupBy::Category => group_by_category(tasks, categories),
        GroupBy::Priority => group_by_priority(tasks, priorities),
    }
}

/// One column per referenced category; the rest under `Uncategorized`.
pub fn group_by_category(tasks: &[Task], categories: &[Category]) -> Vec<Column> {
    group_by_key(
        tasks,
        |t| {
            t.category_id
                .and_then(|id| categories.iter().find(|c| c.id == id))
                .map(|c| (c.name.as_str(), c.color.as_str()))
        },
        UNCATEGORIZED,
    )
}

/// One column per referenced priority; the rest under `No Priority`.
pub fn group_by_priority(tasks: &[Task], priorities: &[Priority]) -> Vec<Column> {
    group_by_key(
        tasks,
        |t| {
            t.priority_id
                .and_then(|id| priorities.iter().find(|p| p.id == id))
                .map(|p| (p.name.as_str(), p.color.as_str()))
        },
        NO_PRIORITY,
    )
}

/// `To Do`, `In Progress`, `Done`, always all three, never overlapping.
pub fn group_by_status(tasks: &[Task]) -> Vec<Column> {
    let mut todo = Vec::new();
    let mut in_progress = Vec::new();
    let mut done = Vec::new();
    for t in tasks {
        if t.is_done {
            done.push(t.clone());
        } else if t.is_started() {
            in_progress.push(t.clone());
        } else {
            todo.push(t.clone());
        }
    }
    vec![
        Column {
            name: "To Do".into(),
            color: "#3b82f6".into(),
            tasks: todo,
        },
        Column {
            name: "In Progress".into(),
            color: "#f59e0b".into(),
            tasks: in_progress,
        },
        Column {
            name: "Done".into(),
            color: "#10b981".into(),
            tasks: done,
        },
    ]
}

/// Columns in order of first appearance. Missing or dangling references
/// fall into the `fallback` column.
fn group_by_key<'a, F>(tasks: &[Task], lookup: F, fallback: &'a str) -> Vec<Column>
where
    F: Fn(&Task) -> Option<(&'a str, &'a str)>,
{
    let mut columns: IndexMap<String, Column> = IndexMap::new();
    for t in tasks {
        let (name, color) = lookup(t).unwrap_or((fallback, NEUTRAL_COLOR));
        columns
            .entry(name.to_string())
            .or_insert_with(|| Column {
                name: name.to_string(),
                color: color.to_string(),
                tasks: Vec::new(),
            })
            .tasks
            .push(t.clone());
    }
    columns.into_values().collect()
}

/// Tasks with a due date, bucketed by UTC calendar day
pub fn tasks_by_day(tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<Task>> {
    let mut days: BTreeMap<NaiveDate, Vec<Task>> = BTreeMap::new();
    for t in tasks {
        if let Some(due) = t.due_date {
            days.entry(due.date_naive()).or_default().push(t.clone());
        }
    }
    days
}

/// Calendar grid for a month: Sunday-first weeks, blank cells outside the month.
/// Returns `None` for an invalid year/month.
pub fn month_grid(year: i32, month: u32) -> Option<Vec<[Option<NaiveDate>; 7]>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let lead = first.weekday().num_days_from_sunday() as usize;

    let mut cells: Vec<Option<NaiveDate>> = vec![None; lead];
    let mut day = first;
    while day.month() == month {
        cells.push(Some(day));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    Some(
        cells
            .chunks(7)
            .map(|week| {
                let mut row = [None; 7];
                row.copy_from_slice(week);
                row
            })
            .collect(),
    )
}

/// The Sunday-started week containing `date`
pub fn week_days(date: NaiveDate) -> [NaiveDate; 7] {
    let start = date - Duration::days(date.weekday().num_days_from_sunday() as i64);
    std::array::from_fn(|i| start + Duration::days(i as i64))
}
