use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_utils::validation::validate_email;

use crate::{EmailMessage, NotificationError};

const PROVIDER: &str = "Email provider";

/// Transactional email provider client: one JSON POST per message.
#[derive(Debug)]
pub struct EmailClient {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_email_configured() {
            return Err(NotificationError::NotConfigured {
                channel: "Email".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotificationError::provider(PROVIDER, e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
        })
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if !validate_email(&message.to) {
            return Err(NotificationError::InvalidRecipient(message.to.clone()));
        }

        debug!("Sending email '{}' to {}", message.subject, message.to);

        let mut body = json!({
            "from": self.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.html
        });
        if !message.attachments.is_empty() {
            body["attachments"] = json!(message.attachments);
        }

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Email delivery failed: {} - {}", status, response_text);
            return Err(NotificationError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, response_text),
            ));
        }

        info!("Email '{}' accepted for {}", message.subject, message.to);
        Ok(())
    }
}
