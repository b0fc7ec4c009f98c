//! Reminder evaluation - decides which events need a reminder at a given instant.
//!
//! Day-before reminders match on the calendar date alone. Same-day reminders
//! match during the hour leading up to the event start: the window
//! `[start - 1h, start)` includes its lower bound and excludes the start itself.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use shared::{Error, Event, ReminderKind, Result};
use tracing::warn;

/// Minutes before the event start at which the same-day reminder window opens.
pub const SAME_DAY_LEAD_MINUTES: i64 = 60;

/// Parse an event time in "H:MM" or "HH:MM" (24h) form.
///
/// The hour may have one or two digits, the minute always has two.
pub fn parse_event_time(event: &Event) -> Result<NaiveTime> {
    let raw = event.time.trim();
    let invalid = || Error::InvalidTime {
        event_id: event.id,
        value: event.time.clone(),
    };

    let (hours, minutes) = raw.split_once(':').ok_or_else(invalid)?;
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(1..=2).contains(&hours.len()) || minutes.len() != 2 || !digits(hours) || !digits(minutes) {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;

    NaiveTime::from_hms_opt(hours, minutes, 0).ok_or_else(invalid)
}

/// Day-before reminder is due when the event is tomorrow and asked for one.
pub fn is_day_before_due(now: DateTime<Utc>, event: &Event) -> bool {
    let Some(tomorrow) = now.date_naive().succ_opt() else {
        return false;
    };
    event.reminder_day_before && event.date == tomorrow
}

/// Same-day reminder is due when the event is today, asked for one, and `now`
/// lies within the hour before it starts.
///
/// Events for another day, or without the flag, are `Ok(false)` without looking
/// at the time. A time that does not parse, including the empty time of an
/// all-day event, is an error so the caller can log and skip it.
pub fn is_same_day_due(now: DateTime<Utc>, event: &Event) -> Result<bool> {
    if !event.reminder_day || event.date != now.date_naive() {
        return Ok(false);
    }

    let starts_at = Utc.from_utc_datetime(&event.date.and_time(parse_event_time(event)?));
    let opens_at = starts_at - Duration::minutes(SAME_DAY_LEAD_MINUTES);

    Ok(now >= opens_at && now < starts_at)
}

pub fn is_due(now: DateTime<Utc>, event: &Event, kind: ReminderKind) -> Result<bool> {
    match kind {
        ReminderKind::DayBefore => Ok(is_day_before_due(now, event)),
        ReminderKind::SameDay => is_same_day_due(now, event),
    }
}

/// Filter a batch of candidates down to those due for `kind`.
///
/// A bad time on one event is logged and that event skipped; the rest of the
/// batch is still evaluated.
pub fn due_events<'a>(now: DateTime<Utc>, kind: ReminderKind, events: &'a [Event]) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| match is_due(now, event, kind) {
            Ok(due) => due,
            Err(e) => {
                warn!(event_id = event.id, kind = %kind, error = %e, "Skipping event with unusable time");
                false
            }
        })
        .collect()
}
