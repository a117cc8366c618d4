use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::services::queue::NotificationQueue;
use crate::services::templates::{
    appointment_email_html, appointment_subject, appointment_whatsapp_text, report_email_html,
    report_subject, AppointmentEvent, AppointmentNotice, ReportNotice,
};
use crate::{EmailAttachment, EmailMessage, NotificationJob, NotificationPayload};

/// Producer side of the notification queue.
///
/// Enqueueing never fails the caller: a notification that cannot be queued
/// is logged and dropped so the primary write still succeeds.
pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    max_attempts: u32,
    clinic_name: String,
}

impl NotificationDispatcher {
    pub fn new(queue: Arc<dyn NotificationQueue>, config: &AppConfig) -> Self {
        Self {
            queue,
            max_attempts: config.notification_max_attempts,
            clinic_name: config.clinic_name.clone(),
        }
    }

    pub fn queue(&self) -> Arc<dyn NotificationQueue> {
        Arc::clone(&self.queue)
    }

    pub async fn enqueue(&self, payload: NotificationPayload) -> Option<Uuid> {
        let job = NotificationJob::new(payload, self.max_attempts);

        match self.queue.enqueue(&job).await {
            Ok(()) => {
                debug!("Queued {} notification {}", job.channel, job.job_id);
                Some(job.job_id)
            }
            Err(e) => {
                warn!(
                    "Dropping {} notification for {}: {}",
                    job.channel,
                    job.payload.recipient(),
                    e
                );
                None
            }
        }
    }

    pub async fn notify_appointment(&self, event: AppointmentEvent, notice: &AppointmentNotice) -> Vec<Uuid> {
        let mut queued = Vec::new();

        if let Some(email) = notice.patient_email.as_deref().filter(|e| !e.is_empty()) {
            let payload = NotificationPayload::Email(EmailMessage {
                to: email.to_string(),
                subject: appointment_subject(&self.clinic_name, event),
                html: appointment_email_html(&self.clinic_name, event, notice),
                attachments: Vec::new(),
            });
            queued.extend(self.enqueue(payload).await);
        }

        if let Some(phone) = notice.patient_phone.as_deref().filter(|p| !p.is_empty()) {
            let payload = NotificationPayload::WhatsappText {
                to: phone.to_string(),
                body: appointment_whatsapp_text(&self.clinic_name, event, notice),
            };
            queued.extend(self.enqueue(payload).await);
        }

        info!(
            "{} notification(s) queued for appointment {} ({:?})",
            queued.len(),
            notice.appointment_id,
            event
        );
        queued
    }

    pub async fn notify_report(&self, notice: &ReportNotice) -> Vec<Uuid> {
        let mut queued = Vec::new();
        let document = BASE64.encode(&notice.pdf);
        let filename = notice.filename();

        if let Some(email) = notice.patient_email.as_deref().filter(|e| !e.is_empty()) {
            let payload = NotificationPayload::Email(EmailMessage {
                to: email.to_string(),
                subject: report_subject(&self.clinic_name),
                html: report_email_html(&self.clinic_name, notice),
                attachments: vec![EmailAttachment {
                    filename: filename.clone(),
                    content_type: "application/pdf".to_string(),
                    content: document.clone(),
                }],
            });
            queued.extend(self.enqueue(payload).await);
        }

        if let Some(phone) = notice.patient_phone.as_deref().filter(|p| !p.is_empty()) {
            let payload = NotificationPayload::WhatsappDocument {
                to: phone.to_string(),
                filename,
                caption: Some(format!("{}: appointment report", self.clinic_name)),
                mime_type: "application/pdf".to_string(),
                document,
            };
            queued.extend(self.enqueue(payload).await);
        }

        info!("{} report notification(s) queued for appointment {}", queued.len(), notice.appointment_id);
        queued
    }
}
