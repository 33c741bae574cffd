//! Filtering, ordering and summary counts over a task collection.
//!
//! Everything here is a pure function of its inputs. The current instant is
//! passed in by the caller so the same inputs always give the same output.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::category::Priority;
use crate::model::filter::{SortDirection, SortField, TaskFilter, TaskSort};
use crate::model::task::Task;
use crate::util::dates::{DayEdge, parse_instant};

/// Aggregate counts for dashboard display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
    /// Percentage in `0.0..=100.0`; `0.0` for an empty collection
    pub completion_rate: f64,
}

/// Visible tasks plus the counts computed over them
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub tasks: Vec<Task>,
    pub stats: TaskStats,
}

/// Filter predicates with the due-date bounds already parsed
struct Predicates<'a> {
    search: Option<String>,
    category_id: Option<i64>,
    priority_id: Option<i64>,
    is_done: Option<bool>,
    due_from: Option<DateTime<Utc>>,
    due_to: Option<DateTime<Utc>>,
    overdue_only: bool,
    tags: &'a [String],
}

impl<'a> Predicates<'a> {
    fn new(filter: &'a TaskFilter) -> Self {
        Predicates {
            search: filter
                .search
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            category_id: filter.category_id.filter(|id| *id != 0),
            priority_id: filter.priority_id.filter(|id| *id != 0),
            is_done: filter.is_done,
            due_from: filter
                .due_date_from
                .as_deref()
                .and_then(|s| parse_instant(s, DayEdge::Start)),
            due_to: filter
                .due_date_to
                .as_deref()
                .and_then(|s| parse_instant(s, DayEdge::End)),
            overdue_only: filter.is_overdue == Some(true),
            tags: &filter.tags,
        }
    }

    fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if let Some(needle) = &self.search {
            let in_title = task.title.to_lowercase().contains(needle.as_str());
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle.as_str()));
            if !in_title && !in_description {
                return false;
            }
        }

        if let Some(done) = self.is_done
            && task.is_done != done
        {
            return false;
        }

        // Uncategorized / unprioritized tasks are never hidden by these two
        if let (Some(want), Some(have)) = (self.category_id, task.category_id)
            && want != have
        {
            return false;
        }
        if let (Some(want), Some(have)) = (self.priority_id, task.priority_id)
            && want != have
        {
            return false;
        }

        if let Some(due) = task.due_date {
            if self.due_from.is_some_and(|from| due < from) {
                return false;
            }
            if self.due_to.is_some_and(|to| due > to) {
                return false;
            }
        }

        if self.overdue_only && !task.is_overdue(now) {
            return false;
        }

        if !self.tags.is_empty() && !self.tags.iter().any(|t| task.has_tag(t)) {
            return false;
        }

        true
    }
}

/// Keep the tasks satisfying every present predicate of `filter`, in input order.
pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter, now: DateTime<Utc>) -> Vec<Task> {
    if filter.is_empty() {
        return tasks.to_vec();
    }
    let predicates = Predicates::new(filter);
    tasks
        .iter()
        .filter(|t| predicates.matches(t, now))
        .cloned()
        .collect()
}

/// Counts over whatever collection is given.
pub fn compute_stats(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.is_done).count();
    let overdue = tasks.iter().filter(|t| t.is_overdue(now)).count();
    let completion_rate = if total > 0 {
        completed as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    TaskStats {
        total,
        completed,
        pending: total - completed,
        overdue,
        completion_rate,
    }
}

/// Default view order: position ascending, newest first among equal positions.
pub fn default_order(a: &Task, b: &Task) -> Ordering {
    a.position
        .cmp(&b.position)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Order tasks for display.
///
/// With no directive the default view order applies. An explicit directive
/// orders by that field first, and ties fall back to the default view order.
/// Tasks missing a due date or a (resolvable) priority go last in either
/// direction.
pub fn sort_tasks(tasks: &[Task], sort: Option<&TaskSort>, priorities: &[Priority]) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    let Some(sort) = sort else {
        sorted.sort_by(default_order);
        return sorted;
    };

    let levels: HashMap<i64, i32> = priorities.iter().map(|p| (p.id, p.level)).collect();
    let level_of = |t: &Task| t.priority_id.and_then(|id| levels.get(&id).copied());

    sorted.sort_by(|a, b| {
        let primary = match sort.field {
            SortField::Title => directed(
                a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                sort.direction,
            ),
            SortField::CreatedAt => directed(a.created_at.cmp(&b.created_at), sort.direction),
            SortField::Position => directed(a.position.cmp(&b.position), sort.direction),
            SortField::DueDate => missing_last(a.due_date, b.due_date, sort.direction),
            SortField::Priority => missing_last(level_of(a), level_of(b), sort.direction),
        };
        primary.then_with(|| default_order(a, b))
    });
    sorted
}

fn directed(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    }
}

fn missing_last<T: Ord>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.cmp(&b), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Filter, order, and count the visible set in one pass over the pipeline.
pub fn query(
    tasks: &[Task],
    filter: &TaskFilter,
    sort: Option<&TaskSort>,
    priorities: &[Priority],
    now: DateTime<Utc>,
) -> QueryResult {
    let visible = filter_tasks(tasks, filter, now);
    let tasks = sort_tasks(&visible, sort, priorities);
    let stats = compute_stats(&tasks, now);
    QueryResult { tasks, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn task(id: i64, title: &str) -> Task {
        Task {
            id,
            user_id: "u1".into(),
            title: title.into(),
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
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    fn priority(id: i64, level: i32) -> Priority {
        Priority {
            id,
            name: format!("P{}", level),
            level,
            color: "#f59e0b".into(),
            user_id: "u1".into(),
            created_at: now(),
        }
    }

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    fn sample() -> Vec<Task> {
        let mut a = task(1, "Write report");
        a.description = Some("Quarterly numbers".into());
        a.category_id = Some(5);
        a.tags = vec!["work".into()];
        a.due_date = Some(now() - Duration::days(1));

        let mut b = task(2, "Buy milk");
        b.tags = vec!["home".into()];
        b.is_done = true;

        let mut c = task(3, "Call plumber");
        c.category_id = Some(6);
        c.priority_id = Some(1);
        c.due_date = Some(now() + Duration::days(3));

        vec![a, b, c]
    }

    // -- filter_tasks -------------------------------------------------------

    #[test]
    fn test_empty_filter_is_identity() {
        let tasks = sample();
        assert_eq!(filter_tasks(&tasks, &TaskFilter::default(), now()), tasks);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let tasks = sample();
        let filters = [
            TaskFilter {
                search: Some("r".into()),
                ..Default::default()
            },
            TaskFilter {
                category_id: Some(5),
                is_done: Some(false),
                ..Default::default()
            },
            TaskFilter {
                is_overdue: Some(true),
                tags: vec!["work".into(), "home".into()],
                ..Default::default()
            },
        ];
        for f in &filters {
            let once = filter_tasks(&tasks, f, now());
            let twice = filter_tasks(&once, f, now());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_search_title_or_description_case_insensitive() {
        let tasks = sample();
        let f = TaskFilter {
            search: Some("QUARTERLY".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1]);

        let f = TaskFilter {
            search: Some("milk".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![2]);
    }

    #[test]
    fn test_non_matching_description_does_not_exclude_title_match() {
        let mut t = task(1, "Plan trip");
        t.description = Some("flights and hotels".into());
        let f = TaskFilter {
            search: Some("plan".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&[t], &f, now())), vec![1]);
    }

    #[test]
    fn test_empty_search_is_no_constraint() {
        let tasks = sample();
        let f = TaskFilter {
            search: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(filter_tasks(&tasks, &f, now()).len(), 3);
    }

    #[test]
    fn test_is_done_exact() {
        let tasks = sample();
        let f = TaskFilter {
            is_done: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![2]);
        let f = TaskFilter {
            is_done: Some(false),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1, 3]);
    }

    #[test]
    fn test_category_filter_keeps_uncategorized() {
        let tasks = sample();
        let f = TaskFilter {
            category_id: Some(5),
            ..Default::default()
        };
        // Task 2 has no category and stays; task 3 (category 6) goes
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1, 2]);
    }

    #[test]
    fn test_unset_category_retained_alone() {
        let t = task(1, "Loose end");
        let f = TaskFilter {
            category_id: Some(5),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&[t], &f, now())), vec![1]);
    }

    #[test]
    fn test_priority_filter_keeps_unprioritized() {
        let tasks = sample();
        let f = TaskFilter {
            priority_id: Some(2),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1, 2]);
    }

    #[test]
    fn test_zero_id_is_no_constraint() {
        let tasks = sample();
        let f = TaskFilter {
            category_id: Some(0),
            ..Default::default()
        };
        assert_eq!(filter_tasks(&tasks, &f, now()).len(), 3);
    }

    #[test]
    fn test_due_bounds_inclusive_and_skip_undated() {
        let tasks = sample();
        // Task 3 is due 2025-06-18 12:00; a date-only upper bound covers the whole day
        let f = TaskFilter {
            due_date_from: Some("2025-06-18".into()),
            due_date_to: Some("2025-06-18".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![2, 3]);

        let f = TaskFilter {
            due_date_to: Some("2025-06-17".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1, 2]);
    }

    #[test]
    fn test_due_bound_exact_instant_is_inclusive() {
        let tasks = sample();
        let f = TaskFilter {
            due_date_from: Some("2025-06-18T12:00:00Z".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![2, 3]);
    }

    #[test]
    fn test_malformed_due_bound_is_no_constraint() {
        let tasks = sample();
        let f = TaskFilter {
            due_date_from: Some("soonish".into()),
            due_date_to: Some("2025-99-99".into()),
            ..Default::default()
        };
        assert_eq!(filter_tasks(&tasks, &f, now()), tasks);
    }

    #[test]
    fn test_overdue_example() {
        let mut a = task(1, "late");
        a.due_date = Some(now() - Duration::days(1));
        let mut b = task(2, "late but done");
        b.due_date = Some(now() - Duration::days(1));
        b.is_done = true;
        let mut c = task(3, "upcoming");
        c.due_date = Some(now() + Duration::days(1));

        let f = TaskFilter {
            is_overdue: Some(true),
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&[a, b, c], &f, now())), vec![1]);
    }

    #[test]
    fn test_overdue_false_is_no_constraint() {
        let tasks = sample();
        let f = TaskFilter {
            is_overdue: Some(false),
            ..Default::default()
        };
        assert_eq!(filter_tasks(&tasks, &f, now()).len(), 3);
    }

    #[test]
    fn test_overdue_requires_strictly_past() {
        let mut t = task(1, "due right now");
        t.due_date = Some(now());
        let f = TaskFilter {
            is_overdue: Some(true),
            ..Default::default()
        };
        assert!(filter_tasks(&[t], &f, now()).is_empty());
    }

    #[test]
    fn test_tags_example() {
        let mut a = task(1, "a");
        a.tags = vec!["work".into()];
        let mut b = task(2, "b");
        b.tags = vec!["home".into()];
        let c = task(3, "c");

        let f = TaskFilter {
            tags: vec!["work".into()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&[a, b, c], &f, now())), vec![1]);
    }

    #[test]
    fn test_tags_any_intersection() {
        let tasks = sample();
        let f = TaskFilter {
            tags: vec!["home".into(), "work".into()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1, 2]);
    }

    #[test]
    fn test_predicates_are_conjunctive() {
        let tasks = sample();
        let f = TaskFilter {
            search: Some("a".into()),
            is_done: Some(false),
            tags: vec!["work".into()],
            ..Default::default()
        };
        assert_eq!(ids(&filter_tasks(&tasks, &f, now())), vec![1]);
    }

    // -- compute_stats ------------------------------------------------------

    #[test]
    fn test_stats_empty() {
        assert_eq!(
            compute_stats(&[], now()),
            TaskStats {
                total: 0,
                completed: 0,
                pending: 0,
                overdue: 0,
                completion_rate: 0.0,
            }
        );
    }

    #[test]
    fn test_stats_counts() {
        let stats = compute_stats(&sample(), now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.overdue, 1);
        assert!((stats.completion_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    // -- sort_tasks ---------------------------------------------------------

    #[test]
    fn test_default_order_position_then_newest() {
        let mut a = task(1, "a");
        a.position = 2;
        let mut b = task(2, "b");
        b.position = 1;
        let mut c = task(3, "c");
        c.position = 1;
        c.created_at = b.created_at + Duration::hours(1);

        let sorted = sort_tasks(&[a, b, c], None, &[]);
        assert_eq!(ids(&sorted), vec![3, 2, 1]);
    }

    #[test]
    fn test_default_order_stable_for_equal_keys() {
        let mut tasks: Vec<Task> = (1..=4).map(|i| task(i, "same")).collect();
        for t in &mut tasks {
            t.position = 0;
        }
        let sorted = sort_tasks(&tasks, None, &[]);
        assert_eq!(ids(&sorted), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_sort_ties_fall_back_to_default_order() {
        let mut a = task(1, "a");
        a.priority_id = Some(10);
        let mut b = task(2, "b");
        b.priority_id = Some(11);
        let mut c = task(3, "c");
        c.priority_id = Some(10);
        let priorities = [priority(10, 1), priority(11, 1)];

        // Same level everywhere, so position decides regardless of input order.
        let sorted = sort_tasks(&[c.clone(), a.clone(), b.clone()], Some(&TaskSort::asc(SortField::Priority)), &priorities);
        assert_eq!(ids(&sorted), vec![1, 2, 3]);

        let sorted = sort_tasks(&[c, a, b], Some(&TaskSort::desc(SortField::Priority)), &priorities);
        assert_eq!(ids(&sorted), vec![1, 2, 3]);
    }

    #[test]
    fn test_sort_equal_titles_by_position_then_newest() {
        let mut tasks: Vec<Task> = (1..=3).map(|i| task(i, "Same")).collect();
        tasks[0].position = 2;
        tasks[1].position = 1;
        tasks[2].position = 0;
        let sorted = sort_tasks(&tasks, Some(&TaskSort::asc(SortField::Title)), &[]);
        assert_eq!(ids(&sorted), vec![3, 2, 1]);

        tasks[2].position = 1;
        tasks[2].created_at = tasks[1].created_at + Duration::hours(1);
        let sorted = sort_tasks(&tasks, Some(&TaskSort::desc(SortField::Title)), &[]);
        assert_eq!(ids(&sorted), vec![3, 2, 1]);
    }

    #[test]
    fn test_sort_title_case_insensitive() {
        let tasks = vec![task(1, "banana"), task(2, "Apple"), task(3, "cherry")];
        let sorted = sort_tasks(&tasks, Some(&TaskSort::asc(SortField::Title)), &[]);
        assert_eq!(ids(&sorted), vec![2, 1, 3]);
        let sorted = sort_tasks(&tasks, Some(&TaskSort::desc(SortField::Title)), &[]);
        assert_eq!(ids(&sorted), vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_due_date_missing_last_both_directions() {
        let tasks = sample(); // 1: yesterday, 2: none, 3: in three days
        let asc = sort_tasks(&tasks, Some(&TaskSort::asc(SortField::DueDate)), &[]);
        assert_eq!(ids(&asc), vec![1, 3, 2]);
        let desc = sort_tasks(&tasks, Some(&TaskSort::desc(SortField::DueDate)), &[]);
        assert_eq!(ids(&desc), vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_priority_by_level_dangling_last() {
        let mut a = task(1, "a");
        a.priority_id = Some(20); // level 3
        let mut b = task(2, "b");
        b.priority_id = Some(99); // deleted priority
        let mut c = task(3, "c");
        c.priority_id = Some(10); // level 1
        let priorities = [priority(10, 1), priority(20, 3)];

        let sorted = sort_tasks(&[a, b, c], Some(&TaskSort::asc(SortField::Priority)), &priorities);
        assert_eq!(ids(&sorted), vec![3, 1, 2]);
    }

    #[test]
    fn test_sort_created_at_desc() {
        let mut a = task(1, "a");
        a.created_at = now() - Duration::days(2);
        let mut b = task(2, "b");
        b.created_at = now() - Duration::days(1);
        let sorted = sort_tasks(&[a, b], Some(&TaskSort::desc(SortField::CreatedAt)), &[]);
        assert_eq!(ids(&sorted), vec![2, 1]);
    }

    #[test]
    fn test_query_counts_visible_set() {
        let tasks = sample();
        let f = TaskFilter {
            is_done: Some(false),
            ..Default::default()
        };
        let result = query(&tasks, &f, Some(&TaskSort::asc(SortField::DueDate)), &[], now());
        assert_eq!(ids(&result.tasks), vec![1, 3]);
        assert_eq!(result.stats.total, 2);
        assert_eq!(result.stats.overdue, 1);
        assert_eq!(result.stats.completed, 0);
    }
}
