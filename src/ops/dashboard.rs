use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::model::category::{Category, Priority};
use crate::model::task::Task;
use crate::ops::query::{TaskStats, compute_stats};

/// Completion figures for one category or priority
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStat {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub total: usize,
    pub completed: usize,
    /// Rounded percentage
    pub completion_rate: u32,
}

/// Activity on one day of the trailing week
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub created: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub stats: TaskStats,
    /// `stats.completion_rate` rounded to a whole percent
    pub completion_percent: u32,
    pub tracked_minutes: u64,
    pub estimated_minutes: u64,
    pub categories: Vec<GroupStat>,
    pub priorities: Vec<GroupStat>,
    pub created_this_week: usize,
    pub completed_this_week: usize,
    /// Seven UTC days, oldest first, today last
    pub weekly: Vec<DayActivity>,
}

/// Derived statistics for the dashboard over the given tasks.
pub fn dashboard(
    tasks: &[Task],
    categories: &[Category],
    priorities: &[Priority],
    now: DateTime<Utc>,
) -> Dashboard {
    let stats = compute_stats(tasks, now);
    let completion_percent = stats.completion_rate.round() as u32;

    let tracked_minutes = tasks.iter().map(|t| t.actual_time.unwrap_or(0) as u64).sum();
    let estimated_minutes = tasks
        .iter()
        .map(|t| t.estimated_time.unwrap_or(0) as u64)
        .sum();

    let categories = categories
        .iter()
        .filter_map(|c| {
            group_stat(c.id, &c.name, &c.color, tasks.iter().filter(|t| t.category_id == Some(c.id)))
        })
        .collect();
    let priorities = priorities
        .iter()
        .filter_map(|p| {
            group_stat(p.id, &p.name, &p.color, tasks.iter().filter(|t| t.priority_id == Some(p.id)))
        })
        .collect();

    let week_ago = now - Duration::days(7);
    let created_this_week = tasks.iter().filter(|t| t.created_at > week_ago).count();
    let completed_this_week = tasks
        .iter()
        .filter(|t| t.completed_at.is_some_and(|at| at > week_ago))
        .count();

    let today = now.date_naive();
    let weekly = (0..7)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            DayActivity {
                date,
                created: tasks
                    .iter()
                    .filter(|t| t.created_at.date_naive() == date)
                    .count(),
                completed: tasks
                    .iter()
                    .filter(|t| t.completed_at.is_some_and(|at| at.date_naive() == date))
                    .count(),
            }
        })
        .collect();

    Dashboard {
        stats,
        completion_percent,
        tracked_minutes,
        estimated_minutes,
        categories,
        priorities,
        created_this_week,
        completed_this_week,
        weekly,
    }
}

/// `None` when no task references the record
fn group_stat<'a>(
    id: i64,
    name: &str,
    color: &str,
    tasks: impl Iterator<Item = &'a Task>,
) -> Option<GroupStat> {
    let (total, completed) = tasks.fold((0, 0), |(total, done), t| {
        (total + 1, done + usize::from(t.is_done))
    });
    if total == 0 {
        return None;
    }
    Some(GroupStat {
        id,
        name: name.to_string(),
        color: color.to_string(),
        total,
        completed,
        completion_rate: (completed as f64 / total as f64 * 100.0).round() as u32,
    })
}

/// `1h 30m`, `2h`, `45m`
pub fn format_minutes(minutes: u64) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn task(id: i64) -> Task {
        Task {
            id,
            user_id: "u1".into(),
            title: format!("task {}", id),
            description: None,
            is_done: false,
            category_id: None,
            priority_id: None,
            due_date: None,
            completed_at: None,
            estimated_time: None,
            actual_time: None,
            tags: Vec::new(),
            is_recurring: false,
            recurrence_pattern: None,
            recurrence_interval: 1,
            position: id,
            created_at: now() - Duration::days(30),
            updated_at: None,
        }
    }

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.into(),
            color: "#3b82f6".into(),
            user_id: "u1".into(),
            created_at: now(),
        }
    }

    #[test]
    fn test_empty_dashboard() {
        let d = dashboard(&[], &[category(1, "Work")], &[], now());
        assert_eq!(d.stats.total, 0);
        assert_eq!(d.completion_percent, 0);
        assert!(d.categories.is_empty());
        assert_eq!(d.weekly.len(), 7);
        assert_eq!(d.weekly[6].date, now().date_naive());
    }

    #[test]
    fn test_time_totals() {
        let mut a = task(1);
        a.actual_time = Some(90);
        a.estimated_time = Some(60);
        let mut b = task(2);
        b.estimated_time = Some(30);
        let d = dashboard(&[a, b], &[], &[], now());
        assert_eq!(d.tracked_minutes, 90);
        assert_eq!(d.estimated_minutes, 90);
    }

    #[test]
    fn test_category_breakdown_exact_match_only() {
        let mut a = task(1);
        a.category_id = Some(1);
        a.is_done = true;
        let mut b = task(2);
        b.category_id = Some(1);
        let mut c = task(3);
        c.category_id = Some(1);
        let d_task = task(4); // uncategorized, not counted anywhere

        let d = dashboard(
            &[a, b, c, d_task],
            &[category(1, "Work"), category(2, "Home")],
            &[],
            now(),
        );
        assert_eq!(
            d.categories,
            vec![GroupStat {
                id: 1,
                name: "Work".into(),
                color: "#3b82f6".into(),
                total: 3,
                completed: 1,
                completion_rate: 33,
            }]
        );
        assert_eq!(d.completion_percent, 25);
    }

    #[test]
    fn test_weekly_activity() {
        let mut a = task(1);
        a.created_at = now() - Duration::hours(1);
        let mut b = task(2);
        b.created_at = now() - Duration::days(2);
        b.completed_at = Some(now() - Duration::hours(2));
        b.is_done = true;

        let d = dashboard(&[a, b], &[], &[], now());
        assert_eq!(d.created_this_week, 2);
        assert_eq!(d.completed_this_week, 1);
        assert_eq!(d.weekly[6].created, 1);
        assert_eq!(d.weekly[6].completed, 1);
        assert_eq!(d.weekly[4].created, 1);
        assert_eq!(d.weekly[0].created, 0);
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(120), "2h");
        assert_eq!(format_minutes(95), "1h 35m");
    }
}
