use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Queue operation failed: {0}")]
    QueueError(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{channel} is not configured")]
    NotConfigured { channel: String },

    #[error("{provider} request failed: {message}")]
    ProviderError { provider: String, message: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Media not found: {0}")]
    MediaNotFound(String),
}

impl NotificationError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        NotificationError::ProviderError {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(e: reqwest::Error) -> Self {
        NotificationError::provider("HTTP", e.to_string())
    }
}

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::JobNotFound(_) | NotificationError::MediaNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            NotificationError::InvalidRecipient(msg) => AppError::BadRequest(msg),
            NotificationError::NotConfigured { .. } | NotificationError::ProviderError { .. } => {
                AppError::ExternalService(e.to_string())
            }
            NotificationError::QueueError(_)
            | NotificationError::RedisError(_)
            | NotificationError::SerializationError(_) => AppError::Internal(e.to_string()),
        }
    }
}
