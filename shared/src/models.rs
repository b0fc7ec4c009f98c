//! Shared data models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar event as stored by the calendar API.
///
/// All-day events carry an empty `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    /// "HH:MM", empty for all-day events
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub location: String,
    pub email: String,
    pub phone: String,
    /// Reminder on the same day
    pub reminder_day: bool,
    /// Reminder one day before
    pub reminder_day_before: bool,
    #[serde(default)]
    pub is_all_day: bool,
}

impl Event {
    pub fn has_location(&self) -> bool {
        !self.location.trim().is_empty()
    }
}

/// Which reminder is being sent for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    DayBefore,
    SameDay,
}

impl ReminderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderKind::DayBefore => "day_before",
            ReminderKind::SameDay => "same_day",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
