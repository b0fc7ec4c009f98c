//! Configuration management for the reminder service.

use std::env;

use crate::{Error, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_FROM_NAME: &str = "Calendar Reminder";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,
    /// Pool size for the event store
    pub db_max_connections: u32,
    /// Email channel settings, `None` when the channel is not configured
    pub email: Option<EmailConfig>,
    /// WhatsApp channel settings, `None` when the channel is not configured
    pub whatsapp: Option<WhatsAppConfig>,
}

/// Sender identity for email reminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub from_email: String,
    pub from_name: String,
}

/// Twilio credentials for WhatsApp reminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| Error::Config("DATABASE_URL not set".to_string()))?;

        let db_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("Invalid DATABASE_MAX_CONNECTIONS: {}", raw))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let email = get("FROM_EMAIL").map(|from_email| EmailConfig {
            from_email,
            from_name: get("FROM_NAME").unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
        });

        let whatsapp = match (get("TWILIO_ACCOUNT_SID"), get("TWILIO_AUTH_TOKEN")) {
            (Some(account_sid), Some(auth_token)) => Some(WhatsAppConfig {
                account_sid,
                auth_token,
                from_number: get("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            email,
            whatsapp,
        })
    }
}
