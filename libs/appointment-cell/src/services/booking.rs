use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use auth_cell::StaffUser;
use notification_cell::{AppointmentEvent, NotificationDispatcher};
use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::Role;
use shared_models::context::{RequestContext, StaffIdentity};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest,
    CandidateSlot, ConflictCheckQuery, ConflictCheckResponse, RescheduleRequest,
};
use crate::services::conflict::{parse_time, validate_slot, ConflictDetectionService};
use crate::services::{appointment_notice, load_active_doctor, load_appointment, load_patient, patch_appointment};

const DEFAULT_PAGE_SIZE: i32 = 50;
const MAX_PAGE_SIZE: i32 = 200;

pub struct AppointmentBookingService {
    store: PostgrestClient,
    conflict_service: ConflictDetectionService,
    notifier: Arc<NotificationDispatcher>,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, notifier: Arc<NotificationDispatcher>) -> Self {
        let store = PostgrestClient::new(config);
        Self {
            conflict_service: ConflictDetectionService::new(store.clone()),
            store,
            notifier,
        }
    }

    pub async fn book_appointment(
        &self,
        ctx: &RequestContext,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if ctx.staff().is_none() && !ctx.is_patient(request.patient_id) {
            warn!("Patient session tried to book for another patient {}", request.patient_id);
            return Err(AppointmentError::Unauthorized);
        }

        let time = parse_time(&request.time)?;
        validate_slot(time, request.duration_minutes)?;

        let patient = load_patient(&self.store, request.patient_id).await?;
        let doctor = load_active_doctor(&self.store, request.doctor_id).await?;

        self.conflict_service
            .ensure_available(&CandidateSlot {
                doctor_id: doctor.id,
                date: request.date,
                time,
                duration_minutes: request.duration_minutes,
                exclude_appointment_id: None,
            })
            .await?;

        let now = Utc::now().to_rfc3339();
        let appointment: Appointment = self
            .store
            .insert(
                "appointments",
                json!({
                    "patient_id": patient.id,
                    "doctor_id": doctor.id,
                    "date": request.date,
                    "time": time.format("%H:%M").to_string(),
                    "duration_minutes": request.duration_minutes,
                    "status": AppointmentStatus::Confirmed,
                    "treatment_type": request.treatment_type,
                    "notes": request.notes,
                    "is_referred": false,
                    "original_doctor_id": null,
                    "current_referral_id": null,
                    "awaiting_original_doctor": false,
                    "created_at": now,
                    "updated_at": now
                }),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!(
            "Booked appointment {} for patient {} with doctor {} on {} at {}",
            appointment.id,
            patient.id,
            doctor.id,
            appointment.date,
            appointment.time_label()
        );

        self.notifier
            .notify_appointment(AppointmentEvent::Confirmed, &appointment_notice(&appointment, &patient, &doctor))
            .await;

        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        ctx: &RequestContext,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = load_appointment(&self.store, appointment_id).await?;

        if ctx.staff().is_none() && !ctx.is_patient(appointment.patient_id) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(appointment)
    }

    pub async fn search_appointments(
        &self,
        staff: &StaffIdentity,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query_string = build_search_query(staff, query);
        debug!("Searching appointments: {}", query_string);

        self.store
            .select("appointments", &query_string)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn update_status(
        &self,
        staff: &StaffIdentity,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        if !matches!(status, AppointmentStatus::Cancelled | AppointmentStatus::Completed) {
            return Err(AppointmentError::InvalidStatusUpdate(status));
        }

        let appointment = load_appointment(&self.store, appointment_id).await?;
        ensure_may_manage(staff, &appointment, "change its status")?;

        let updated = patch_appointment(
            &self.store,
            appointment_id,
            json!({ "status": status, "updated_at": Utc::now().to_rfc3339() }),
        )
        .await?;

        info!(
            "Appointment {} status {} -> {} by {}",
            appointment_id, appointment.status, status, staff.user_id
        );

        if status == AppointmentStatus::Cancelled && appointment.status != AppointmentStatus::Cancelled {
            self.notify(AppointmentEvent::Cancelled, &updated).await;
        }
        Ok(updated)
    }

    pub async fn reschedule_appointment(
        &self,
        staff: &StaffIdentity,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Appointment, AppointmentError> {
        let time = parse_time(&request.time)?;

        let appointment = load_appointment(&self.store, appointment_id).await?;
        ensure_may_manage(staff, &appointment, "reschedule it")?;
        if appointment.is_closed() {
            return Err(AppointmentError::NotModifiable(appointment.status));
        }

        let duration_minutes = request.duration_minutes.unwrap_or(appointment.duration_minutes);
        validate_slot(time, duration_minutes)?;

        self.conflict_service
            .ensure_available(&CandidateSlot {
                doctor_id: appointment.doctor_id,
                date: request.date,
                time,
                duration_minutes,
                exclude_appointment_id: Some(appointment.id),
            })
            .await?;

        let updated = patch_appointment(
            &self.store,
            appointment_id,
            json!({
                "date": request.date,
                "time": time.format("%H:%M").to_string(),
                "duration_minutes": duration_minutes,
                "updated_at": Utc::now().to_rfc3339()
            }),
        )
        .await?;

        info!(
            "Appointment {} rescheduled from {} {} to {} {}",
            appointment_id,
            appointment.date,
            appointment.time_label(),
            updated.date,
            updated.time_label()
        );

        self.notify(AppointmentEvent::Rescheduled, &updated).await;
        Ok(updated)
    }

    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        load_appointment(&self.store, appointment_id).await?;

        self.store
            .delete("appointments", &format!("id=eq.{}", appointment_id))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    pub async fn check_conflicts(&self, query: ConflictCheckQuery) -> Result<ConflictCheckResponse, AppointmentError> {
        let time = parse_time(&query.time)?;

        self.conflict_service
            .check(&CandidateSlot {
                doctor_id: query.doctor_id,
                date: query.date,
                time,
                duration_minutes: query.duration_minutes,
                exclude_appointment_id: query.exclude_appointment_id,
            })
            .await
    }

    /// Notice lookups are best effort; a missing patient or doctor only
    /// costs the notification.
    async fn notify(&self, event: AppointmentEvent, appointment: &Appointment) {
        let patient = load_patient(&self.store, appointment.patient_id).await;
        let doctor: Result<Option<StaffUser>, _> = self
            .store
            .select_one("users", &format!("id=eq.{}", appointment.doctor_id))
            .await;

        match (patient, doctor) {
            (Ok(patient), Ok(Some(doctor))) => {
                self.notifier
                    .notify_appointment(event, &appointment_notice(appointment, &patient, &doctor))
                    .await;
            }
            _ => warn!(
                "Skipping {:?} notification for appointment {}: patient or doctor lookup failed",
                event, appointment.id
            ),
        }
    }
}

/// Front desk and admins manage any appointment; doctors only their own.
fn ensure_may_manage(staff: &StaffIdentity, appointment: &Appointment, action: &str) -> Result<(), AppointmentError> {
    match staff.role {
        Role::Admin | Role::Receptionist => Ok(()),
        Role::Doctor if staff.user_id == appointment.doctor_id => Ok(()),
        Role::Doctor => {
            warn!(
                "Doctor {} tried to {} on appointment {} assigned to {}",
                staff.user_id, action, appointment.id, appointment.doctor_id
            );
            Err(AppointmentError::NotAssignedDoctor(action.to_string()))
        }
    }
}

/// Doctors see their own schedule unless they filter by doctor or patient.
fn build_search_query(staff: &StaffIdentity, query: &AppointmentSearchQuery) -> String {
    let mut parts = Vec::new();

    let doctor_filter = match (query.doctor_id, query.patient_id, staff.role) {
        (Some(doctor_id), _, _) => Some(doctor_id),
        (None, None, Role::Doctor) => Some(staff.user_id),
        _ => None,
    };
    if let Some(doctor_id) = doctor_filter {
        parts.push(format!("doctor_id=eq.{}", doctor_id));
    }
    if let Some(patient_id) = query.patient_id {
        parts.push(format!("patient_id=eq.{}", patient_id));
    }
    if let Some(date) = query.date {
        parts.push(format!("date=eq.{}", date));
    }
    if let Some(status) = query.status {
        parts.push(format!("status=eq.{}", status));
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);
    parts.push("order=date.asc,time.asc".to_string());
    parts.push(format!("limit={}", limit));
    parts.push(format!("offset={}", offset));

    parts.join("&")
}
