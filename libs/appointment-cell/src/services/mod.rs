pub mod booking;
pub mod conflict;
pub mod pdf;
pub mod referral;
pub mod report;
pub mod transition;

use serde_json::Value;
use uuid::Uuid;

use auth_cell::StaffUser;
use notification_cell::AppointmentNotice;
use patient_cell::Patient;
use shared_database::PostgrestClient;
use shared_models::auth::Role;

use crate::models::{Appointment, AppointmentError};

pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use referral::ReferralService;
pub use report::ReportService;

pub(crate) async fn load_appointment(
    store: &PostgrestClient,
    appointment_id: Uuid,
) -> Result<Appointment, AppointmentError> {
    store
        .select_one("appointments", &format!("id=eq.{}", appointment_id))
        .await
        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        .ok_or(AppointmentError::NotFound)
}

pub(crate) async fn load_patient(store: &PostgrestClient, patient_id: Uuid) -> Result<Patient, AppointmentError> {
    store
        .select_one("patients", &format!("id=eq.{}", patient_id))
        .await
        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?
        .ok_or(AppointmentError::PatientNotFound)
}

/// Inactive accounts and non-doctors are reported as missing doctors.
pub(crate) async fn load_active_doctor(
    store: &PostgrestClient,
    doctor_id: Uuid,
) -> Result<StaffUser, AppointmentError> {
    let user: Option<StaffUser> = store
        .select_one("users", &format!("id=eq.{}", doctor_id))
        .await
        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

    user.filter(|u| u.role == Role::Doctor && u.is_active)
        .ok_or(AppointmentError::DoctorNotFound)
}

pub(crate) async fn patch_appointment(
    store: &PostgrestClient,
    appointment_id: Uuid,
    body: Value,
) -> Result<Appointment, AppointmentError> {
    let updated: Vec<Appointment> = store
        .update("appointments", &format!("id=eq.{}", appointment_id), body)
        .await
        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

    updated.into_iter().next().ok_or(AppointmentError::NotFound)
}

pub(crate) fn appointment_notice(appointment: &Appointment, patient: &Patient, doctor: &StaffUser) -> AppointmentNotice {
    AppointmentNotice {
        appointment_id: appointment.id,
        patient_name: patient.full_name(),
        patient_email: patient.email.clone(),
        patient_phone: Some(patient.phone_number.clone()),
        doctor_name: doctor.full_name.clone(),
        date: appointment.date,
        time: appointment.time_label(),
        duration_minutes: appointment.duration_minutes,
        treatment_type: appointment.treatment_type.clone(),
    }
}
