use chrono::NaiveDate;
use uuid::Uuid;

use shared_utils::validation::escape_html;

/// Recipient and slot details for an appointment notice.
#[derive(Debug, Clone)]
pub struct AppointmentNotice {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i32,
    pub treatment_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Confirmed,
    Rescheduled,
    Cancelled,
}

impl AppointmentEvent {
    fn headline(&self) -> &'static str {
        match self {
            AppointmentEvent::Confirmed => "Appointment confirmed",
            AppointmentEvent::Rescheduled => "Appointment rescheduled",
            AppointmentEvent::Cancelled => "Appointment cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportNotice {
    pub appointment_id: Uuid,
    pub patient_name: String,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub pdf: Vec<u8>,
}

impl ReportNotice {
    pub fn filename(&self) -> String {
        format!("report-{}.pdf", self.date.format("%Y-%m-%d"))
    }
}

pub fn appointment_subject(clinic: &str, event: AppointmentEvent) -> String {
    format!("{}: {}", clinic, event.headline())
}

pub fn appointment_email_html(clinic: &str, event: AppointmentEvent, notice: &AppointmentNotice) -> String {
    let treatment = notice
        .treatment_type
        .as_deref()
        .map(|t| format!("<li>Treatment: {}</li>", escape_html(t)))
        .unwrap_or_default();

    format!(
        "<h2>{headline}</h2>\
         <p>Dear {patient},</p>\
         <ul><li>Date: {date}</li><li>Time: {time}</li><li>Duration: {duration} minutes</li>\
         <li>Doctor: {doctor}</li>{treatment}</ul>\
         <p>{clinic}</p>",
        headline = event.headline(),
        patient = escape_html(&notice.patient_name),
        date = notice.date.format("%d %B %Y"),
        time = escape_html(&notice.time),
        duration = notice.duration_minutes,
        doctor = escape_html(&notice.doctor_name),
        treatment = treatment,
        clinic = escape_html(clinic),
    )
}

pub fn appointment_whatsapp_text(clinic: &str, event: AppointmentEvent, notice: &AppointmentNotice) -> String {
    format!(
        "{}: {} with {} on {} at {} ({} min).",
        clinic,
        event.headline(),
        notice.doctor_name,
        notice.date.format("%d/%m/%Y"),
        notice.time,
        notice.duration_minutes
    )
}

pub fn report_subject(clinic: &str) -> String {
    format!("{}: Your appointment report", clinic)
}

pub fn report_email_html(clinic: &str, notice: &ReportNotice) -> String {
    format!(
        "<p>Dear {},</p><p>Your report from the visit with {} on {} is attached.</p><p>{}</p>",
        escape_html(&notice.patient_name),
        escape_html(&notice.doctor_name),
        notice.date.format("%d %B %Y"),
        escape_html(clinic),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> AppointmentNotice {
        AppointmentNotice {
            appointment_id: Uuid::new_v4(),
            patient_name: "Jane <Doe>".to_string(),
            patient_email: Some("jane@example.com".to_string()),
            patient_phone: None,
            doctor_name: "Dr. Molar".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            time: "10:30".to_string(),
            duration_minutes: 30,
            treatment_type: Some("cleaning".to_string()),
        }
    }

    #[test]
    fn test_email_escapes_patient_input() {
        let html = appointment_email_html("Smile Clinic", AppointmentEvent::Confirmed, &notice());
        assert!(html.contains("Jane &lt;Doe&gt;"));
        assert!(html.contains("06 May 2024"));
        assert!(html.contains("Treatment: cleaning"));
    }

    #[test]
    fn test_whatsapp_text() {
        let text = appointment_whatsapp_text("Smile Clinic", AppointmentEvent::Cancelled, &notice());
        assert_eq!(
            text,
            "Smile Clinic: Appointment cancelled with Dr. Molar on 06/05/2024 at 10:30 (30 min)."
        );
    }
}
