//! Calendar event reminders.
//!
//! Evaluates which events need a day-before or same-day reminder and delivers
//! them over email and WhatsApp on a fixed UTC schedule.

pub mod evaluator;
pub mod notify;
pub mod scheduler;

pub use notify::{Delivery, EmailNotifier, Notifier, WhatsAppNotifier};
pub use scheduler::{ReminderDispatcher, ReminderScheduler, TickReport};
