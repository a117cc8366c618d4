use std::time::Duration;

use reqwest::{multipart, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_utils::validation::normalize_phone;

use crate::{MediaDownload, NotificationError};

const PROVIDER: &str = "WhatsApp";

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaInfoResponse {
    url: String,
    mime_type: Option<String>,
}

/// WhatsApp Business (Graph API) client.
/// Messages: POST {base}/{phone_number_id}/messages
/// Media:    POST {base}/{phone_number_id}/media, GET {base}/{media_id}
#[derive(Debug)]
pub struct WhatsappClient {
    client: Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl WhatsappClient {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        if !config.is_whatsapp_configured() {
            return Err(NotificationError::NotConfigured {
                channel: "WhatsApp".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotificationError::provider(PROVIDER, e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.whatsapp_api_url.trim_end_matches('/').to_string(),
            access_token: config.whatsapp_access_token.clone(),
            phone_number_id: config.whatsapp_phone_number_id.clone(),
        })
    }

    fn recipient(to: &str) -> Result<String, NotificationError> {
        let digits = normalize_phone(to);
        if !(7..=15).contains(&digits.len()) {
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }
        Ok(digits)
    }

    async fn check(response: Response, action: &str) -> Result<Response, NotificationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let response_text = response.text().await.unwrap_or_default();
        error!("WhatsApp {} failed: {} - {}", action, status, response_text);

        if status == StatusCode::NOT_FOUND {
            return Err(NotificationError::MediaNotFound(response_text));
        }
        Err(NotificationError::provider(
            PROVIDER,
            format!("{} failed with HTTP {}: {}", action, status, response_text),
        ))
    }

    async fn post_message(&self, body: Value) -> Result<(), NotificationError> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        debug!("Sending WhatsApp message via {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        Self::check(response, "message send").await?;
        Ok(())
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), NotificationError> {
        let to = Self::recipient(to)?;

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "preview_url": false, "body": body }
        }))
        .await?;

        info!("WhatsApp text delivered to provider for {}", to);
        Ok(())
    }

    /// Uploads a file and returns the media id to reference in messages.
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<String, NotificationError> {
        let url = format!("{}/{}/media", self.base_url, self.phone_number_id);
        debug!("Uploading {} bytes of {} to WhatsApp media", bytes.len(), mime_type);

        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| NotificationError::provider(PROVIDER, e.to_string()))?;
        let form = multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;

        let upload: MediaUploadResponse = Self::check(response, "media upload")
            .await?
            .json()
            .await?;

        Ok(upload.id)
    }

    pub async fn send_document(
        &self,
        to: &str,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), NotificationError> {
        let to = Self::recipient(to)?;
        let media_id = self.upload_media(bytes, mime_type, filename).await?;

        let mut document = json!({ "id": media_id, "filename": filename });
        if let Some(caption) = caption {
            document["caption"] = json!(caption);
        }

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "document",
            "document": document
        }))
        .await?;

        info!("WhatsApp document {} delivered to provider for {}", filename, to);
        Ok(())
    }

    /// Resolves a media id to its download URL and fetches the bytes.
    pub async fn download_media(&self, media_id: &str) -> Result<MediaDownload, NotificationError> {
        let url = format!("{}/{}", self.base_url, media_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let info: MediaInfoResponse = Self::check(response, "media lookup").await?.json().await?;

        let response = self
            .client
            .get(&info.url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let response = Self::check(response, "media download").await?;

        let mime_type = info
            .mime_type
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(MediaDownload { mime_type, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_recipient_is_normalized() {
        assert_eq!(WhatsappClient::recipient("+353 (87) 123-4567").unwrap(), "353871234567");
        assert_matches!(WhatsappClient::recipient("12"), Err(NotificationError::InvalidRecipient(_)));
    }
}
