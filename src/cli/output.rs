use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::model::category::{Category, Priority};
use crate::model::filter::{SortDirection, SortField, TaskSort};
use crate::model::task::{RecurrencePattern, Task};
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::Catalog;
use crate::ops::dashboard::{Dashboard, format_minutes};
use crate::ops::query::TaskStats;
use crate::ops::recurrence::describe;
use crate::ops::views::{Column, GroupBy};
use crate::util::dates::{DayEdge, format_due, parse_instant};
use crate::util::unicode::{fit_to_width, truncate_to_width};

const TITLE_WIDTH: usize = 60;
const NAME_WIDTH: usize = 16;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// A task plus the display fields derived from the catalog
#[derive(Serialize)]
pub struct TaskJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<&'a str>,
    pub overdue: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub recurrence: String,
}

#[derive(Serialize)]
pub struct QueryJson<'a> {
    pub tasks: Vec<TaskJson<'a>>,
    pub stats: &'a TaskStats,
}

#[derive(Serialize)]
pub struct ColumnJson<'a> {
    pub name: &'a str,
    pub color: &'a str,
    pub tasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct CalendarDayJson<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<TaskJson<'a>>,
}

#[derive(Serialize)]
pub struct CalendarJson<'a> {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<CalendarDayJson<'a>>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json<'a>(task: &'a Task, catalog: &'a Catalog, now: DateTime<Utc>) -> TaskJson<'a> {
    TaskJson {
        task,
        category: catalog.category(task.category_id).map(|c| c.name.as_str()),
        priority: catalog.priority(task.priority_id).map(|p| p.name.as_str()),
        overdue: task.is_overdue(now),
        recurrence: describe(task),
    }
}

pub fn tasks_to_json<'a>(
    tasks: &'a [Task],
    catalog: &'a Catalog,
    now: DateTime<Utc>,
) -> Vec<TaskJson<'a>> {
    tasks.iter().map(|t| task_to_json(t, catalog, now)).collect()
}

pub fn columns_to_json<'a>(
    columns: &'a [Column],
    catalog: &'a Catalog,
    now: DateTime<Utc>,
) -> Vec<ColumnJson<'a>> {
    columns
        .iter()
        .map(|c| ColumnJson {
            name: &c.name,
            color: &c.color,
            tasks: tasks_to_json(&c.tasks, catalog, now),
        })
        .collect()
}

/// Days in `start..=end` that have tasks
pub fn calendar_to_json<'a>(
    start: NaiveDate,
    end: NaiveDate,
    by_day: &'a BTreeMap<NaiveDate, Vec<Task>>,
    catalog: &'a Catalog,
    now: DateTime<Utc>,
) -> CalendarJson<'a> {
    CalendarJson {
        start,
        end,
        days: by_day
            .range(start..=end)
            .map(|(date, tasks)| CalendarDayJson {
                date: *date,
                tasks: tasks_to_json(tasks, catalog, now),
            })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// One-line summary: checkbox, id, title, then the set attributes
pub fn format_task_line(task: &Task, catalog: &Catalog, now: DateTime<Utc>) -> String {
    let check = if task.is_done { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {:>3} {}",
        check,
        task.id,
        truncate_to_width(&task.title, TITLE_WIDTH)
    );

    let mut extras = Vec::new();
    if let Some(c) = catalog.category(task.category_id) {
        extras.push(format!("@{}", c.name));
    }
    if let Some(p) = catalog.priority(task.priority_id) {
        extras.push(format!("!{}", p.name));
    }
    if let Some(due) = task.due_date {
        let mut s = format!("due {}", format_due(due));
        if task.is_overdue(now) {
            s.push_str(" (overdue)");
        }
        extras.push(s);
    }
    let recurrence = describe(task);
    if !recurrence.is_empty() {
        extras.push(format!("~{}", recurrence));
    }
    for tag in &task.tags {
        extras.push(format!("#{}", tag));
    }
    if let Some(minutes) = task.actual_time.filter(|m| *m > 0) {
        extras.push(format!("{} tracked", format_minutes(minutes as u64)));
    }

    if !extras.is_empty() {
        line.push_str("  ");
        line.push_str(&extras.join(" "));
    }
    line
}

/// Detailed task view
pub fn format_task_detail(task: &Task, catalog: &Catalog, now: DateTime<Utc>) -> Vec<String> {
    let check = if task.is_done { 'x' } else { ' ' };
    let mut lines = vec![format!("[{}] {} {}", check, task.id, task.title)];

    if task.category_id.is_some() {
        lines.push(format!("category: {}", catalog.category_name(task.category_id)));
    }
    if task.priority_id.is_some() {
        lines.push(format!("priority: {}", catalog.priority_name(task.priority_id)));
    }
    if let Some(due) = task.due_date {
        let overdue = if task.is_overdue(now) { " (overdue)" } else { "" };
        lines.push(format!("due: {}{}", format_due(due), overdue));
    }
    if !task.tags.is_empty() {
        lines.push(format!(
            "tags: {}",
            task.tags
                .iter()
                .map(|t| format!("#{}", t))
                .collect::<Vec<_>>()
                .join(" ")
        ));
    }
    if let Some(m) = task.estimated_time {
        lines.push(format!("estimate: {}", format_minutes(m as u64)));
    }
    if let Some(m) = task.actual_time {
        lines.push(format!("tracked: {}", format_minutes(m as u64)));
    }
    let recurrence = describe(task);
    if !recurrence.is_empty() {
        lines.push(format!("repeats: {}", recurrence));
    }
    lines.push(format!("created: {}", task.created_at.format("%Y-%m-%d %H:%M")));
    if let Some(at) = task.updated_at {
        lines.push(format!("updated: {}", at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(at) = task.completed_at {
        lines.push(format!("completed: {}", at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(desc) = &task.description {
        lines.push("description:".to_string());
        for line in desc.lines() {
            lines.push(format!("  {}", line));
        }
    }
    lines
}

pub fn format_stats(stats: &TaskStats) -> String {
    format!(
        "{} tasks: {} done, {} pending, {} overdue ({}% complete)",
        stats.total,
        stats.completed,
        stats.pending,
        stats.overdue,
        stats.completion_rate.round() as u32
    )
}

pub fn format_dashboard(d: &Dashboard) -> Vec<String> {
    let mut lines = vec![
        format_stats(&d.stats),
        format!(
            "time: {} tracked, {} estimated",
            format_minutes(d.tracked_minutes),
            format_minutes(d.estimated_minutes)
        ),
        format!(
            "last 7 days: {} created, {} completed",
            d.created_this_week, d.completed_this_week
        ),
    ];

    for (title, groups) in [("by category:", &d.categories), ("by priority:", &d.priorities)] {
        if groups.is_empty() {
            continue;
        }
        lines.push(String::new());
        lines.push(title.to_string());
        for g in groups {
            lines.push(format!(
                "  {} {:>3}/{:<3} {:>3}%",
                fit_to_width(&g.name, NAME_WIDTH),
                g.completed,
                g.total,
                g.completion_rate
            ));
        }
    }

    lines.push(String::new());
    lines.push("activity:".to_string());
    for day in &d.weekly {
        lines.push(format!(
            "  {}  +{} created  {} done",
            day.date.format("%a %m-%d"),
            day.created,
            day.completed
        ));
    }
    lines
}

/// Columns one after another, each under a `== name (count) ==` header
pub fn format_board(columns: &[Column], catalog: &Catalog, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("== {} ({}) ==", column.name, column.tasks.len()));
        if column.tasks.is_empty() {
            lines.push("  (none)".to_string());
        }
        for task in &column.tasks {
            lines.push(format_task_line(task, catalog, now));
        }
    }
    lines
}

/// Month grid (days with tasks marked `*`) followed by the month's agenda
pub fn format_month(
    first: NaiveDate,
    grid: &[[Option<NaiveDate>; 7]],
    by_day: &BTreeMap<NaiveDate, Vec<Task>>,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = vec![
        first.format("%B %Y").to_string(),
        "Su  Mo  Tu  We  Th  Fr  Sa".to_string(),
    ];
    for week in grid {
        let row: String = week
            .iter()
            .map(|cell| match cell {
                Some(date) => {
                    let mark = if by_day.contains_key(date) { '*' } else { ' ' };
                    format!("{:>2}{} ", date.day(), mark)
                }
                None => "    ".to_string(),
            })
            .collect();
        lines.push(row.trim_end().to_string());
    }

    let last = grid
        .iter()
        .flatten()
        .filter_map(|d| *d)
        .last()
        .unwrap_or(first);
    for (date, tasks) in by_day.range(first..=last) {
        lines.push(String::new());
        lines.push(date.format("%a %Y-%m-%d").to_string());
        for task in tasks {
            lines.push(format!("  {}", format_task_line(task, catalog, now)));
        }
    }
    lines
}

/// One heading per day of the week, tasks beneath
pub fn format_week(
    days: &[NaiveDate; 7],
    by_day: &BTreeMap<NaiveDate, Vec<Task>>,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut lines = Vec::new();
    for date in days {
        let marker = if *date == now.date_naive() { "  (today)" } else { "" };
        lines.push(format!("{}{}", date.format("%a %Y-%m-%d"), marker));
        for task in by_day.get(date).map(Vec::as_slice).unwrap_or_default() {
            lines.push(format!("  {}", format_task_line(task, catalog, now)));
        }
    }
    lines
}

pub fn format_category(c: &Category) -> String {
    format!("{:>3} {} {}", c.id, fit_to_width(&c.name, NAME_WIDTH), c.color)
}

pub fn format_priority(p: &Priority) -> String {
    format!(
        "{:>3} {} level {:<3} {}",
        p.id,
        fit_to_width(&p.name, NAME_WIDTH),
        p.level,
        p.color
    )
}

pub fn format_time_entry(e: &TimeEntry) -> String {
    let span = match (e.end_time, e.duration) {
        (Some(_), Some(d)) => format_minutes(d as u64),
        (Some(_), None) => "stopped".to_string(),
        (None, _) => "running".to_string(),
    };
    let mut line = format!(
        "{:>3} task {:<4} {}  {}",
        e.id,
        e.task_id,
        e.start_time.format("%Y-%m-%d %H:%M"),
        span
    );
    if let Some(desc) = &e.description {
        line.push_str("  ");
        line.push_str(desc);
    }
    line
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

pub fn parse_sort(field: &str, desc: bool) -> Result<TaskSort, String> {
    let field = SortField::parse_field(field).ok_or_else(|| {
        format!(
            "unknown sort field '{}' (expected: title, created, due, priority, position)",
            field
        )
    })?;
    let direction = if desc {
        SortDirection::Desc
    } else {
        SortDirection::Asc
    };
    Ok(TaskSort { field, direction })
}

pub fn parse_group(s: &str) -> Result<GroupBy, String> {
    GroupBy::parse_group(s)
        .ok_or_else(|| format!("unknown grouping '{}' (expected: status, category, priority)", s))
}

pub fn parse_pattern(s: &str) -> Result<RecurrencePattern, String> {
    RecurrencePattern::parse_pattern(s).ok_or_else(|| {
        format!(
            "unknown repeat pattern '{}' (expected: daily, weekly, monthly, yearly)",
            s
        )
    })
}

/// A due date argument. A bare date means the end of that day.
pub fn parse_due(s: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(s, DayEdge::End)
        .ok_or_else(|| format!("invalid date '{}' (expected YYYY-MM-DD or RFC 3339)", s))
}

pub fn parse_day(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", s))
}
