use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_config::AppConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Whatsapp,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Email => write!(f, "email"),
            NotificationChannel::Whatsapp => write!(f, "whatsapp"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    /// Base64 encoded file content.
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationPayload {
    Email(EmailMessage),
    WhatsappText {
        to: String,
        body: String,
    },
    WhatsappDocument {
        to: String,
        filename: String,
        caption: Option<String>,
        mime_type: String,
        /// Base64 encoded document bytes, uploaded to the media endpoint at send time.
        document: String,
    },
}

impl NotificationPayload {
    pub fn channel(&self) -> NotificationChannel {
        match self {
            NotificationPayload::Email(_) => NotificationChannel::Email,
            NotificationPayload::WhatsappText { .. } | NotificationPayload::WhatsappDocument { .. } => {
                NotificationChannel::Whatsapp
            }
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            NotificationPayload::Email(message) => &message.to,
            NotificationPayload::WhatsappText { to, .. }
            | NotificationPayload::WhatsappDocument { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Sending,
    Retrying,
    Delivered,
    Failed,
}

impl NotificationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NotificationStatus::Delivered | NotificationStatus::Failed)
    }

    pub fn can_transition_to(&self, target: &NotificationStatus) -> bool {
        use NotificationStatus::*;
        match (self, target) {
            (Queued, Sending) | (Retrying, Sending) => true,
            (Sending, Delivered) | (Sending, Retrying) | (Sending, Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub job_id: Uuid,
    pub channel: NotificationChannel,
    pub payload: NotificationPayload,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: NotificationStatus,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationJob {
    pub fn new(payload: NotificationPayload, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            channel: payload.channel(),
            payload,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            status: NotificationStatus::Queued,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at <= now
    }

    /// Moves the job to `target`, ignoring transitions the lifecycle forbids.
    pub fn transition(&mut self, target: NotificationStatus) -> bool {
        if !self.status.can_transition_to(&target) {
            return false;
        }
        self.status = target;
        self.updated_at = Utc::now();
        true
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub concurrency: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            worker_id: "notification-worker".to_string(),
            concurrency: config.notification_workers.max(1),
            base_backoff: Duration::from_secs(config.notification_backoff_seconds),
            max_backoff: Duration::from_secs(config.notification_max_backoff_seconds),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Delay before the next attempt after `attempt` failed ones: `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent)
        .map(|delay| delay.min(max))
        .unwrap_or(max)
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaDownload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let base = Duration::from_secs(5);
        let max = Duration::from_secs(60);

        assert_eq!(backoff_delay(1, base, max), Duration::from_secs(5));
        assert_eq!(backoff_delay(2, base, max), Duration::from_secs(10));
        assert_eq!(backoff_delay(3, base, max), Duration::from_secs(20));
        assert_eq!(backoff_delay(4, base, max), Duration::from_secs(40));
        assert_eq!(backoff_delay(5, base, max), max);
        assert_eq!(backoff_delay(40, base, max), max);
    }

    #[test]
    fn test_status_lifecycle() {
        let mut job = NotificationJob::new(
            NotificationPayload::WhatsappText { to: "353871234567".into(), body: "hi".into() },
            3,
        );

        assert_eq!(job.channel, NotificationChannel::Whatsapp);
        assert!(!job.transition(NotificationStatus::Delivered));
        assert!(job.transition(NotificationStatus::Sending));
        assert!(job.transition(NotificationStatus::Retrying));
        assert!(job.transition(NotificationStatus::Sending));
        assert!(job.transition(NotificationStatus::Delivered));
        assert!(job.status.is_terminal());
        assert!(!job.transition(NotificationStatus::Sending));
    }

    #[test]
    fn test_payload_round_trips_tagged() {
        let payload = NotificationPayload::Email(EmailMessage {
            to: "jane@example.com".into(),
            subject: "Hello".into(),
            html: "<p>Hi</p>".into(),
            attachments: vec![],
        });

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["kind"], "email");
        assert_eq!(value["to"], "jane@example.com");
    }
}
