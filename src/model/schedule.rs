use chrono::{Datelike, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::schedule::{is_within_window_at, minutes_since_midnight};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Schedule {
    pub id: String,
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    /// ISO weekday, Monday = 1
    #[schema(example = 1)]
    pub day_of_week: i32,
    #[schema(example = "07:30:00", value_type = String)]
    pub start_time: NaiveTime,
    #[schema(example = "09:00:00", value_type = String)]
    pub end_time: NaiveTime,
    pub room: Option<String>,
}

impl Schedule {
    pub fn is_active_at(&self, now: NaiveTime, buffer_minutes: u32) -> bool {
        is_within_window_at(
            minutes_since_midnight(now),
            minutes_since_midnight(self.start_time),
            minutes_since_midnight(self.end_time),
            buffer_minutes,
        )
    }
}

pub fn iso_day_of_week(day: impl Datelike) -> i32 {
    day.weekday().number_from_monday() as i32
}

pub fn is_valid_day(day: i32) -> bool {
    (1..=7).contains(&day)
}

pub fn weekday_name(day: i32) -> Option<&'static str> {
    Some(match day {
        1 => "Senin",
        2 => "Selasa",
        3 => "Rabu",
        4 => "Kamis",
        5 => "Jumat",
        6 => "Sabtu",
        7 => "Minggu",
        _ => return None,
    })
}
