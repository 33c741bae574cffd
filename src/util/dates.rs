use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};

/// Which end of the day a date-only value resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEdge {
    Start,
    End,
}

/// Parse user-supplied date text into an instant.
///
/// Accepts RFC 3339 (`2025-05-10T14:00:00+02:00`), a zoneless timestamp taken
/// as UTC (`2025-05-10T14:00`, `2025-05-10 14:00:00`), or a bare date
/// (`2025-05-10`) which resolves to the first or last instant of that UTC day.
/// Returns `None` for anything else.
pub fn parse_instant(s: &str, edge: DayEdge) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(day_edge(date, edge))
}

/// First or last instant of a UTC calendar day
pub fn day_edge(date: NaiveDate, edge: DayEdge) -> DateTime<Utc> {
    let time = match edge {
        DayEdge::Start => NaiveTime::MIN,
        DayEdge::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN),
    };
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Parse a `YYYY-MM` month argument
pub fn parse_month(s: &str) -> Option<(i32, u32)> {
    let (y, m) = s.trim().split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

/// Short display form: date only when the time is exactly midnight or the
/// last second of the day, otherwise date and minutes.
pub fn format_due(dt: DateTime<Utc>) -> String {
    let t = dt.time();
    if t == NaiveTime::MIN || (t.hour(), t.minute(), t.second()) == (23, 59, 59) {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M").to_string()
    }
}
