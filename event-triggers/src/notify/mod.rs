//! Notification channels for event reminders.
//!
//! Every channel implements [`Notifier`]. The scheduler calls each configured
//! channel independently for every due event, so a failure on one channel
//! never suppresses an attempt on another.

pub mod email;
pub mod whatsapp;

use async_trait::async_trait;
use shared::{Event, ReminderKind, Result};

pub use email::EmailNotifier;
pub use whatsapp::WhatsAppNotifier;

/// Successful outcome of a single channel attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Provider accepted the message
    Sent { id: String },
    /// Channel has no credentials; nothing was attempted
    Skipped { reason: &'static str },
}

/// A way of delivering a reminder for an event.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs and errors.
    fn channel(&self) -> &'static str;

    async fn notify(&self, event: &Event, kind: ReminderKind) -> Result<Delivery>;
}

/// Time shown in messages; all-day events have none.
fn display_time(event: &Event) -> &str {
    if event.time.trim().is_empty() {
        "all day"
    } else {
        event.time.trim()
    }
}
