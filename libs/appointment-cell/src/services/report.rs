use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::StaffUser;
use notification_cell::{NotificationDispatcher, ReportNotice};
use patient_cell::Patient;
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::context::{RequestContext, StaffIdentity};

use crate::models::{
    Appointment, AppointmentError, AppointmentReport, AppointmentStatus, CreateReportRequest, ReportDocument,
};
use crate::services::pdf::render_report_pdf;
use crate::services::{load_appointment, load_patient};

pub struct ReportService {
    store: PostgrestClient,
    notifier: Arc<NotificationDispatcher>,
    clinic_name: String,
}

impl ReportService {
    pub fn new(config: &AppConfig, notifier: Arc<NotificationDispatcher>) -> Self {
        Self {
            store: PostgrestClient::new(config),
            notifier,
            clinic_name: config.clinic_name.clone(),
        }
    }

    pub async fn create_report(
        &self,
        doctor: &StaffIdentity,
        appointment_id: Uuid,
        request: CreateReportRequest,
    ) -> Result<AppointmentReport, AppointmentError> {
        if request.diagnosis.trim().is_empty() || request.treatment_performed.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "Diagnosis and treatment performed are required".to_string(),
            ));
        }

        let appointment = load_appointment(&self.store, appointment_id).await?;
        if appointment.doctor_id != doctor.user_id {
            return Err(AppointmentError::NotAssignedDoctor("write its report".to_string()));
        }
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(AppointmentError::NotModifiable(appointment.status));
        }
        if self.find_report(appointment_id).await?.is_some() {
            return Err(AppointmentError::ReportExists);
        }

        let now = Utc::now().to_rfc3339();
        let report: AppointmentReport = self
            .store
            .insert(
                "appointment_reports",
                json!({
                    "appointment_id": appointment.id,
                    "patient_id": appointment.patient_id,
                    "doctor_id": doctor.user_id,
                    "diagnosis": request.diagnosis.trim(),
                    "treatment_performed": request.treatment_performed.trim(),
                    "recommendations": request.recommendations,
                    "prescriptions": request.prescriptions,
                    "next_visit": request.next_visit,
                    "created_at": now,
                    "updated_at": now
                }),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Doctor {} filed report {} for appointment {}", doctor.user_id, report.id, appointment_id);

        if let Err(e) = self.send_report(&appointment, &report).await {
            warn!("Report {} saved but not sent: {}", report.id, e);
        }
        Ok(report)
    }

    pub async fn get_report(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<AppointmentReport, AppointmentError> {
        let appointment = load_appointment(&self.store, appointment_id).await?;
        ensure_can_view(ctx, &appointment)?;

        self.find_report(appointment_id)
            .await?
            .ok_or(AppointmentError::ReportNotFound)
    }

    /// Returns the download filename and the rendered PDF.
    pub async fn render_pdf(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<(String, Vec<u8>), AppointmentError> {
        let appointment = load_appointment(&self.store, appointment_id).await?;
        ensure_can_view(ctx, &appointment)?;

        let report = self
            .find_report(appointment_id)
            .await?
            .ok_or(AppointmentError::ReportNotFound)?;
        let (patient, doctor) = self.participants(&appointment).await?;

        let pdf = render_report_pdf(&self.document(&appointment, &patient, &doctor, report))?;
        debug!("Rendered {} byte report PDF for appointment {}", pdf.len(), appointment_id);

        Ok((format!("report-{}.pdf", appointment.date.format("%Y-%m-%d")), pdf))
    }

    async fn send_report(&self, appointment: &Appointment, report: &AppointmentReport) -> Result<(), AppointmentError> {
        let (patient, doctor) = self.participants(appointment).await?;
        let pdf = render_report_pdf(&self.document(appointment, &patient, &doctor, report.clone()))?;

        self.notifier
            .notify_report(&ReportNotice {
                appointment_id: appointment.id,
                patient_name: patient.full_name(),
                patient_email: patient.email.clone(),
                patient_phone: Some(patient.phone_number.clone()),
                doctor_name: doctor.full_name.clone(),
                date: appointment.date,
                pdf,
            })
            .await;
        Ok(())
    }

    async fn participants(&self, appointment: &Appointment) -> Result<(Patient, StaffUser), AppointmentError> {
        let patient = load_patient(&self.store, appointment.patient_id).await?;
        let doctor: StaffUser = self
            .store
            .select_one("users", &format!("id=eq.{}", appointment.doctor_id))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
            .ok_or(AppointmentError::DoctorNotFound)?;
        Ok((patient, doctor))
    }

    fn document(
        &self,
        appointment: &Appointment,
        patient: &Patient,
        doctor: &StaffUser,
        report: AppointmentReport,
    ) -> ReportDocument {
        ReportDocument {
            clinic_name: self.clinic_name.clone(),
            patient_name: patient.full_name(),
            patient_date_of_birth: Some(patient.date_of_birth),
            doctor_name: doctor.full_name.clone(),
            appointment_date: appointment.date,
            appointment_time: appointment.time_label(),
            treatment_type: appointment.treatment_type.clone(),
            report,
        }
    }

    async fn find_report(&self, appointment_id: Uuid) -> Result<Option<AppointmentReport>, AppointmentError> {
        self.store
            .select_one("appointment_reports", &format!("appointment_id=eq.{}", appointment_id))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}

fn ensure_can_view(ctx: &RequestContext, appointment: &Appointment) -> Result<(), AppointmentError> {
    if ctx.staff().is_some() || ctx.is_patient(appointment.patient_id) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}
