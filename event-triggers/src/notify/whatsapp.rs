//! WhatsApp reminders through the Twilio Messages API.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{Error, Event, ReminderKind, Result, WhatsAppConfig};
use std::time::Duration;
use tracing::info;

use super::{display_time, Delivery, Notifier};

const CHANNEL: &str = "whatsapp";
const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

/// WhatsApp channel. Without Twilio credentials it is unconfigured and skips.
pub struct WhatsAppNotifier {
    http_client: reqwest::Client,
    config: Option<WhatsAppConfig>,
}

impl WhatsAppNotifier {
    pub fn new(config: Option<WhatsAppConfig>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }
}

/// Text of the WhatsApp reminder.
pub fn render_text(event: &Event, kind: ReminderKind) -> String {
    let when = match kind {
        ReminderKind::DayBefore => "Tomorrow",
        ReminderKind::SameDay => "Today",
    };

    let mut text = format!(
        "Reminder: {} you have '{}' at {}",
        when,
        event.title,
        display_time(event)
    );

    if event.has_location() {
        text.push_str(&format!(" at {}", event.location.trim()));
    }

    text
}

/// Twilio addresses WhatsApp numbers as `whatsapp:+E164`.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

async fn send_whatsapp(
    http_client: &reqwest::Client,
    config: &WhatsAppConfig,
    to: &str,
    text: &str,
) -> Result<String> {
    let url = format!(
        "{}/Accounts/{}/Messages.json",
        TWILIO_API_BASE, config.account_sid
    );

    let to = whatsapp_address(to);
    let from = whatsapp_address(&config.from_number);
    let form = [("To", to.as_str()), ("From", from.as_str()), ("Body", text)];

    let response = http_client
        .post(&url)
        .basic_auth(&config.account_sid, Some(&config.auth_token))
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::delivery(CHANNEL, format!("Failed to send WhatsApp message: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(Error::delivery(
            CHANNEL,
            format!("Twilio request failed: {} {}", status, detail),
        ));
    }

    let message: TwilioMessage = response
        .json()
        .await
        .map_err(|e| Error::delivery(CHANNEL, format!("Invalid Twilio response: {}", e)))?;

    Ok(message.sid)
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn notify(&self, event: &Event, kind: ReminderKind) -> Result<Delivery> {
        let Some(config) = &self.config else {
            info!(event_id = event.id, "Twilio credentials not configured, skipping WhatsApp notification");
            return Ok(Delivery::Skipped {
                reason: "twilio credentials not configured",
            });
        };

        if event.phone.trim().is_empty() {
            return Err(Error::delivery(CHANNEL, "Event has no phone number"));
        }

        let text = render_text(event, kind);
        let sid = send_whatsapp(&self.http_client, config, &event.phone, &text).await?;

        info!(event_id = event.id, sid = %sid, "WhatsApp message sent");

        Ok(Delivery::Sent { id: sid })
    }
}
