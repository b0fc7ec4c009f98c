//! Reminder Scheduler - Sends calendar event reminders on a fixed UTC schedule.
//!
//! This service runs alongside the calendar API and:
//! 1. Every day at 09:00 UTC sends reminders for tomorrow's events
//! 2. Every hour sends reminders for today's events starting within the hour
//! 3. Delivers each reminder by email (SES) and WhatsApp (Twilio)

use anyhow::Context;
use event_triggers::{
    EmailNotifier, Notifier, ReminderDispatcher, ReminderScheduler, WhatsAppNotifier,
};
use shared::{db, Config, EventStore, PgEventStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn build_notifiers(config: &Config) -> anyhow::Result<Vec<Arc<dyn Notifier>>> {
    let email = match &config.email {
        Some(email_config) => {
            let aws_config =
                aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            EmailNotifier::new(aws_sdk_ses::Client::new(&aws_config), email_config.clone())
        }
        None => {
            warn!("FROM_EMAIL not set, email reminders disabled");
            EmailNotifier::unconfigured()
        }
    };

    let whatsapp = WhatsAppNotifier::new(config.whatsapp.clone())?;
    if !whatsapp.is_configured() {
        warn!("Twilio credentials not set, WhatsApp reminders disabled");
    }

    let notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(email), Arc::new(whatsapp)];
    Ok(notifiers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    if dotenv.is_err() {
        info!("No .env file found, using process environment");
    }

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = db::create_pool(&config)
        .await
        .context("Failed to connect to database")?;
    let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool));

    let notifiers = build_notifiers(&config).await?;
    let scheduler = ReminderScheduler::new(ReminderDispatcher::new(store, notifiers));

    scheduler.start();

    shutdown_signal().await;
    info!("Shutdown signal received");

    scheduler.stop();
    scheduler.join().await;

    Ok(())
}
