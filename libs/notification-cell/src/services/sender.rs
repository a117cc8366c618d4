use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::warn;

use shared_config::AppConfig;

use crate::services::email::EmailClient;
use crate::services::whatsapp::WhatsappClient;
use crate::{NotificationError, NotificationPayload};

/// Delivers one payload to its provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError>;
}

/// Routes payloads to the configured email and WhatsApp clients.
pub struct ProviderSender {
    email: Option<EmailClient>,
    whatsapp: Option<WhatsappClient>,
}

impl ProviderSender {
    pub fn new(config: &AppConfig) -> Self {
        let email = EmailClient::new(config)
            .map_err(|e| warn!("Email notifications disabled: {}", e))
            .ok();
        let whatsapp = WhatsappClient::new(config)
            .map_err(|e| warn!("WhatsApp notifications disabled: {}", e))
            .ok();

        Self { email, whatsapp }
    }

    fn whatsapp(&self) -> Result<&WhatsappClient, NotificationError> {
        self.whatsapp.as_ref().ok_or_else(|| NotificationError::NotConfigured {
            channel: "WhatsApp".to_string(),
        })
    }
}

#[async_trait]
impl NotificationSender for ProviderSender {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), NotificationError> {
        match payload {
            NotificationPayload::Email(message) => {
                let client = self.email.as_ref().ok_or_else(|| NotificationError::NotConfigured {
                    channel: "Email".to_string(),
                })?;
                client.send(message).await
            }
            NotificationPayload::WhatsappText { to, body } => self.whatsapp()?.send_text(to, body).await,
            NotificationPayload::WhatsappDocument {
                to,
                filename,
                caption,
                mime_type,
                document,
            } => {
                let bytes = BASE64.decode(document).map_err(|e| {
                    NotificationError::QueueError(format!("Stored document is not valid base64: {}", e))
                })?;
                self.whatsapp()?
                    .send_document(to, bytes, mime_type, filename, caption.as_deref())
                    .await
            }
        }
    }
}
