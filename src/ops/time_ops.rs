use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::model::time_entry::TimeEntry;

/// A timer about to be started
#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeEntry {
    pub task_id: i64,
    pub description: Option<String>,
}

/// Closing fields for a running entry
#[derive(Debug, Clone, PartialEq)]
pub struct StopPatch {
    pub end_time: DateTime<Utc>,
    pub duration: u32,
}

impl StopPatch {
    pub fn to_json(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("end_time".into(), json!(self.end_time));
        body.insert("duration".into(), json!(self.duration));
        body
    }
}

/// The running timer, if any. Entries are expected newest first.
pub fn active_entry(entries: &[TimeEntry]) -> Option<&TimeEntry> {
    entries.iter().find(|e| e.is_running())
}

/// Whole minutes between two instants, rounded to nearest, never negative
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> u32 {
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        return 0;
    }
    let minutes = (secs + 30) / 60;
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Close `entry` at `now`. The returned duration is also the number of
/// minutes to add to the task's tracked time.
pub fn stop(entry: &TimeEntry, now: DateTime<Utc>) -> StopPatch {
    StopPatch {
        end_time: now,
        duration: elapsed_minutes(entry.start_time, now),
    }
}

pub fn apply_stop(entry: &mut TimeEntry, patch: &StopPatch) {
    entry.end_time = Some(patch.end_time);
    entry.duration = Some(patch.duration);
}

/// Sum of closed entries' durations
pub fn total_minutes(entries: &[TimeEntry]) -> u64 {
    entries
        .iter()
        .filter_map(|e| e.duration)
        .map(u64::from)
        .sum()
}

/// Newest first, by start time
pub fn sort_entries(entries: &mut [TimeEntry]) {
    entries.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}
