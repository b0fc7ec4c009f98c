//! Email reminders through Amazon SES.

use async_trait::async_trait;
use aws_sdk_ses::types::{Body, Content, Destination, Message};
use aws_sdk_ses::Client as SesClient;
use shared::{EmailConfig, Error, Event, ReminderKind, Result};
use tracing::info;

use super::{display_time, Delivery, Notifier};

const CHANNEL: &str = "email";

/// Rendered email for one reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn render(event: &Event, kind: ReminderKind) -> Self {
        let location = if event.has_location() {
            format!("Location: {}\n", event.location.trim())
        } else {
            String::new()
        };

        match kind {
            ReminderKind::DayBefore => Self {
                subject: format!("Reminder: {} tomorrow", event.title),
                body: format!(
                    "Hi!\n\nJust a reminder that tomorrow you have:\n\n\
                     Event: {}\nDate: {}\nTime: {}\n{}\nDon't miss it!\n",
                    event.title,
                    event.date.format("%d/%m/%Y"),
                    display_time(event),
                    location
                ),
            },
            ReminderKind::SameDay => Self {
                subject: format!("Reminder: {} today", event.title),
                body: format!(
                    "Hi!\n\nJust a reminder that today you have:\n\n\
                     Event: {}\nTime: {}\n{}\nHave a great day!\n",
                    event.title,
                    display_time(event),
                    location
                ),
            },
        }
    }

    pub fn html(&self) -> String {
        format!(
            r#"
        <!DOCTYPE html>
        <html>
        <head><meta charset="UTF-8"></head>
        <body style="font-family: sans-serif; padding: 20px;">
            <h2>{}</h2>
            <p>{}</p>
            <hr>
            <p style="color: #666; font-size: 12px;">
                Sent by your family calendar
            </p>
        </body>
        </html>
        "#,
            escape_html(&self.subject),
            escape_html(&self.body).replace('\n', "<br>")
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Email channel. Without a sender address it is unconfigured and skips.
pub struct EmailNotifier {
    sender: Option<(SesClient, EmailConfig)>,
}

impl EmailNotifier {
    pub fn new(client: SesClient, config: EmailConfig) -> Self {
        Self {
            sender: Some((client, config)),
        }
    }

    pub fn unconfigured() -> Self {
        Self { sender: None }
    }

    pub fn is_configured(&self) -> bool {
        self.sender.is_some()
    }
}

async fn send_email(
    client: &SesClient,
    config: &EmailConfig,
    to_email: &str,
    message: &EmailMessage,
) -> Result<String> {
    let subject = Content::builder()
        .data(&message.subject)
        .charset("UTF-8")
        .build()
        .map_err(|e| Error::Aws(format!("Failed to build subject: {}", e)))?;

    let html_content = Content::builder()
        .data(message.html())
        .charset("UTF-8")
        .build()
        .map_err(|e| Error::Aws(format!("Failed to build body: {}", e)))?;

    let text_content = Content::builder()
        .data(&message.body)
        .charset("UTF-8")
        .build()
        .map_err(|e| Error::Aws(format!("Failed to build text body: {}", e)))?;

    let body_content = Body::builder()
        .html(html_content)
        .text(text_content)
        .build();

    let ses_message = Message::builder()
        .subject(subject)
        .body(body_content)
        .build();

    let destination = Destination::builder().to_addresses(to_email).build();

    let result = client
        .send_email()
        .source(format!("{} <{}>", config.from_name, config.from_email))
        .destination(destination)
        .message(ses_message)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to send email: {}", e)))?;

    Ok(result.message_id().to_string())
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        CHANNEL
    }

    async fn notify(&self, event: &Event, kind: ReminderKind) -> Result<Delivery> {
        let Some((client, config)) = &self.sender else {
            info!(event_id = event.id, "Email not configured, skipping email notification");
            return Ok(Delivery::Skipped {
                reason: "email sender not configured",
            });
        };

        let to_email = event.email.trim();
        if to_email.is_empty() {
            return Err(Error::delivery(CHANNEL, "Event has no email address"));
        }

        let message = EmailMessage::render(event, kind);
        let message_id = send_email(client, config, to_email, &message).await?;

        info!(event_id = event.id, to = %to_email, message_id = %message_id, "Email sent");

        Ok(Delivery::Sent { id: message_id })
    }
}
