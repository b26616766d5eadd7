use chrono::{Local, NaiveTime, Timelike};
use thiserror::Error;

pub const DEFAULT_BUFFER_MINUTES: u32 = 15;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid time `{0}`, expected HH:MM")]
pub struct TimeParseError(pub String);

/// Parses "HH:MM" (seconds, if present, are ignored) into minutes since midnight.
pub fn minutes_of_day(value: &str) -> Result<u32, TimeParseError> {
    let mut parts = value.trim().split(':');

    let hours: u32 = parts
        .next()
        .and_then(|h| h.parse().ok())
        .ok_or_else(|| TimeParseError(value.to_string()))?;
    let minutes: u32 = parts
        .next()
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| TimeParseError(value.to_string()))?;

    if hours > 23 || minutes > 59 {
        return Err(TimeParseError(value.to_string()));
    }

    Ok(hours * 60 + minutes)
}

pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// `now` in `[start - buffer, end + buffer]`, inclusive, no wrap past midnight.
pub fn is_within_window_at(now: u32, start: u32, end: u32, buffer: u32) -> bool {
    let lower = start.saturating_sub(buffer);
    let upper = end.saturating_add(buffer);
    (lower..=upper).contains(&now)
}

/// Checks the local wall clock against a lesson slot.
pub fn is_within_schedule_time(
    start: &str,
    end: &str,
    buffer_minutes: Option<u32>,
) -> Result<bool, TimeParseError> {
    let now = minutes_since_midnight(Local::now().time());
    is_within_schedule_time_at(now, start, end, buffer_minutes)
}

pub fn is_within_schedule_time_at(
    now: u32,
    start: &str,
    end: &str,
    buffer_minutes: Option<u32>,
) -> Result<bool, TimeParseError> {
    let start = minutes_of_day(start)?;
    let end = minutes_of_day(end)?;
    let buffer = buffer_minutes.unwrap_or(DEFAULT_BUFFER_MINUTES);

    Ok(is_within_window_at(now, start, end, buffer))
}
