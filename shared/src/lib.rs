//! Shared library for the calendar reminder service.
//!
//! This crate provides configuration, error types, the event model and the event store.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use config::{Config, EmailConfig, WhatsAppConfig};
pub use error::{Error, Result};
pub use models::{Event, ReminderKind};
pub use store::{EventStore, PgEventStore};
