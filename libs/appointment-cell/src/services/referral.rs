use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::Role;
use shared_models::context::StaffIdentity;

use crate::models::{
    Appointment, AppointmentError, CreateReferralRequest, PreviousAssignment, Referral, ReferralAction,
    ReferralDirection, ReferralListQuery, ReferralStatus,
};
use crate::services::transition::plan_transition;
use crate::services::{load_active_doctor, load_appointment, patch_appointment};

/// A referral together with the appointment it moved.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralOutcome {
    pub referral: Referral,
    pub appointment: Appointment,
}

pub struct ReferralService {
    store: PostgrestClient,
}

impl ReferralService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn create_referral(
        &self,
        doctor: &StaffIdentity,
        request: CreateReferralRequest,
    ) -> Result<ReferralOutcome, AppointmentError> {
        let appointment = load_appointment(&self.store, request.appointment_id).await?;

        if appointment.doctor_id != doctor.user_id {
            return Err(AppointmentError::NotAssignedDoctor("refer it".to_string()));
        }
        if request.to_doctor_id == doctor.user_id {
            return Err(AppointmentError::ValidationError(
                "Cannot refer an appointment to yourself".to_string(),
            ));
        }
        load_active_doctor(&self.store, request.to_doctor_id).await?;

        if appointment.is_closed() {
            return Err(AppointmentError::NotModifiable(appointment.status));
        }
        if let Some(current_id) = appointment.current_referral_id {
            let current = self.find_referral(current_id).await?;
            if current.is_some_and(|r| r.status.is_open()) {
                warn!(
                    "Doctor {} tried to refer appointment {} which already has open referral {}",
                    doctor.user_id, appointment.id, current_id
                );
                return Err(AppointmentError::ReferralAlreadyOpen);
            }
        }

        let now = Utc::now().to_rfc3339();
        let referral: Referral = self
            .store
            .insert(
                "appointment_referrals",
                json!({
                    "appointment_id": appointment.id,
                    "from_doctor_id": doctor.user_id,
                    "to_doctor_id": request.to_doctor_id,
                    "status": ReferralStatus::Pending,
                    "notes": request.notes,
                    "previous_assignment": PreviousAssignment::capture(&appointment),
                    "created_at": now,
                    "updated_at": now
                }),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let appointment = patch_appointment(
            &self.store,
            appointment.id,
            json!({
                "is_referred": true,
                "original_doctor_id": appointment.original_doctor_id.unwrap_or(appointment.doctor_id),
                "current_referral_id": referral.id,
                "updated_at": now
            }),
        )
        .await?;

        info!(
            "Doctor {} referred appointment {} to doctor {} (referral {})",
            doctor.user_id, appointment.id, referral.to_doctor_id, referral.id
        );

        Ok(ReferralOutcome { referral, appointment })
    }

    pub async fn list_referrals(
        &self,
        doctor: &StaffIdentity,
        query: &ReferralListQuery,
    ) -> Result<Vec<Referral>, AppointmentError> {
        let column = match query.direction {
            ReferralDirection::Incoming => "to_doctor_id",
            ReferralDirection::Outgoing => "from_doctor_id",
        };

        let mut query_string = format!("{}=eq.{}", column, doctor.user_id);
        if let Some(status) = query.status {
            query_string.push_str(&format!("&status=eq.{}", status));
        }
        query_string.push_str("&order=created_at.desc");

        debug!("Listing referrals: {}", query_string);
        self.store
            .select("appointment_referrals", &query_string)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Doctors only see referrals they sent or received.
    pub async fn get_referral(&self, staff: &StaffIdentity, referral_id: Uuid) -> Result<Referral, AppointmentError> {
        let referral = self
            .find_referral(referral_id)
            .await?
            .ok_or(AppointmentError::ReferralNotFound)?;

        if staff.role == Role::Doctor
            && staff.user_id != referral.from_doctor_id
            && staff.user_id != referral.to_doctor_id
        {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(referral)
    }

    /// Runs a referral action: 404 for a missing referral or appointment,
    /// then the recipient check, then the transition table.
    pub async fn apply_action(
        &self,
        doctor: &StaffIdentity,
        referral_id: Uuid,
        action: ReferralAction,
    ) -> Result<ReferralOutcome, AppointmentError> {
        let referral = self
            .find_referral(referral_id)
            .await?
            .ok_or(AppointmentError::ReferralNotFound)?;
        let appointment = load_appointment(&self.store, referral.appointment_id).await?;

        let plan = plan_transition(&referral, &appointment, doctor.user_id, action).map_err(|e| {
            warn!("Referral {} {} by {} refused: {}", referral_id, action, doctor.user_id, e);
            e
        })?;

        let now = Utc::now().to_rfc3339();
        let updated: Vec<Referral> = self
            .store
            .update(
                "appointment_referrals",
                &format!("id=eq.{}", referral_id),
                json!({ "status": plan.referral_status, "updated_at": now }),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
        let referral = updated.into_iter().next().ok_or(AppointmentError::ReferralNotFound)?;

        let appointment = if plan.appointment_patch.is_empty() {
            appointment
        } else {
            let mut body = serde_json::to_value(&plan.appointment_patch)
                .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
            body["updated_at"] = json!(now);
            patch_appointment(&self.store, appointment.id, body).await?
        };

        info!(
            "Referral {} {} by doctor {}: now {}",
            referral_id, action, doctor.user_id, referral.status
        );

        Ok(ReferralOutcome { referral, appointment })
    }

    async fn find_referral(&self, referral_id: Uuid) -> Result<Option<Referral>, AppointmentError> {
        self.store
            .select_one("appointment_referrals", &format!("id=eq.{}", referral_id))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }
}
