use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

pub const MIN_DURATION_MINUTES: i32 = 5;
pub const MAX_DURATION_MINUTES: i32 = 480;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;

/// `HH:MM` wire format for appointment times. Stored `HH:MM:SS` values are
/// accepted on read.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub treatment_type: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_referred: bool,
    pub original_doctor_id: Option<Uuid>,
    pub current_referral_id: Option<Uuid>,
    #[serde(default)]
    pub awaiting_original_doctor: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_closed(&self) -> bool {
        matches!(self.status, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }

    pub fn time_label(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
    ReferBack,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::ReferBack => write!(f, "refer_back"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub treatment_type: Option<String>,
    pub notes: Option<String>,
}

fn default_duration() -> i32 {
    DEFAULT_DURATION_MINUTES
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// CONFLICT DETECTION MODELS
// ==============================================================================

/// A slot a doctor would occupy, compared against that doctor's existing
/// appointments on the same date.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSlot {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: i32,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default = "default_duration")]
    pub duration_minutes: i32,
    pub exclude_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictCheckResponse {
    pub is_available: bool,
    pub reason: Option<String>,
    pub conflicting_appointment_id: Option<Uuid>,
}

// ==============================================================================
// REFERRAL MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Accepted,
    Rejected,
    ReferredBack,
    Completed,
}

impl fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferralStatus::Pending => write!(f, "pending"),
            ReferralStatus::Accepted => write!(f, "accepted"),
            ReferralStatus::Rejected => write!(f, "rejected"),
            ReferralStatus::ReferredBack => write!(f, "referred_back"),
            ReferralStatus::Completed => write!(f, "completed"),
        }
    }
}

impl ReferralStatus {
    /// The referral transition table.
    ///
    /// ```text
    /// pending  --accept-->     accepted
    /// pending  --reject-->     rejected
    /// accepted --refer_back--> referred_back
    /// accepted --complete-->   completed
    /// ```
    ///
    /// `rejected` and `completed` are terminal. `referred_back` has no
    /// outgoing edge either.
    pub fn apply(self, action: ReferralAction) -> Result<ReferralStatus, AppointmentError> {
        match (self, action) {
            (ReferralStatus::Pending, ReferralAction::Accept) => Ok(ReferralStatus::Accepted),
            (ReferralStatus::Pending, ReferralAction::Reject) => Ok(ReferralStatus::Rejected),
            (ReferralStatus::Accepted, ReferralAction::ReferBack) => Ok(ReferralStatus::ReferredBack),
            (ReferralStatus::Accepted, ReferralAction::Complete) => Ok(ReferralStatus::Completed),
            (from, action) => Err(AppointmentError::InvalidTransition { from, action }),
        }
    }

    /// Pending and accepted referrals still hold the appointment.
    pub fn is_open(&self) -> bool {
        matches!(self, ReferralStatus::Pending | ReferralStatus::Accepted)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferralAction {
    Accept,
    Reject,
    ReferBack,
    Complete,
}

impl fmt::Display for ReferralAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferralAction::Accept => write!(f, "accept"),
            ReferralAction::Reject => write!(f, "reject"),
            ReferralAction::ReferBack => write!(f, "refer_back"),
            ReferralAction::Complete => write!(f, "complete"),
        }
    }
}

impl FromStr for ReferralAction {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(ReferralAction::Accept),
            "reject" => Ok(ReferralAction::Reject),
            "refer_back" => Ok(ReferralAction::ReferBack),
            "complete" => Ok(ReferralAction::Complete),
            other => Err(AppointmentError::UnknownReferralAction(other.to_string())),
        }
    }
}

/// The appointment's doctor fields as they were when the referral was made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousAssignment {
    pub doctor_id: Uuid,
    pub is_referred: bool,
    pub original_doctor_id: Option<Uuid>,
    pub current_referral_id: Option<Uuid>,
}

impl PreviousAssignment {
    pub fn capture(appointment: &Appointment) -> Self {
        Self {
            doctor_id: appointment.doctor_id,
            is_referred: appointment.is_referred,
            original_doctor_id: appointment.original_doctor_id,
            current_referral_id: appointment.current_referral_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub from_doctor_id: Uuid,
    pub to_doctor_id: Uuid,
    pub status: ReferralStatus,
    pub notes: Option<String>,
    pub previous_assignment: PreviousAssignment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReferralRequest {
    pub appointment_id: Uuid,
    pub to_doctor_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReferralDirection {
    #[default]
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferralListQuery {
    #[serde(default)]
    pub direction: ReferralDirection,
    pub status: Option<ReferralStatus>,
}

/// Fields of an appointment a referral transition rewrites. Unset fields are
/// left alone; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_referred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_doctor_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_referral_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiting_original_doctor: Option<bool>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        *self == AppointmentPatch::default()
    }

    pub fn apply_to(&self, appointment: &mut Appointment) {
        if let Some(doctor_id) = self.doctor_id {
            appointment.doctor_id = doctor_id;
        }
        if let Some(is_referred) = self.is_referred {
            appointment.is_referred = is_referred;
        }
        if let Some(original) = self.original_doctor_id {
            appointment.original_doctor_id = original;
        }
        if let Some(referral) = self.current_referral_id {
            appointment.current_referral_id = referral;
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(awaiting) = self.awaiting_original_doctor {
            appointment.awaiting_original_doctor = awaiting;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub referral_status: ReferralStatus,
    pub appointment_patch: AppointmentPatch,
}

// ==============================================================================
// REPORT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentReport {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub diagnosis: String,
    pub treatment_performed: String,
    pub recommendations: Option<String>,
    pub prescriptions: Option<String>,
    pub next_visit: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    pub diagnosis: String,
    pub treatment_performed: String,
    pub recommendations: Option<String>,
    pub prescriptions: Option<String>,
    pub next_visit: Option<NaiveDate>,
}

/// Everything printed on a report PDF.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub clinic_name: String,
    pub patient_name: String,
    pub patient_date_of_birth: Option<NaiveDate>,
    pub doctor_name: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub treatment_type: Option<String>,
    pub report: AppointmentReport,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Referral not found")]
    ReferralNotFound,

    #[error("Report not found")]
    ReportNotFound,

    #[error("{0}")]
    SlotConflict(String),

    #[error("Invalid appointment time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Duration must be between 5 and 480 minutes")]
    InvalidDuration,

    #[error("Appointment at {0} would run past midnight")]
    EndsAfterMidnight(String),

    #[error("Status can only be set to cancelled or completed, not {0}")]
    InvalidStatusUpdate(AppointmentStatus),

    #[error("Appointment cannot be modified in current status: {0}")]
    NotModifiable(AppointmentStatus),

    #[error("Cannot {action} a referral that is {from}")]
    InvalidTransition {
        from: ReferralStatus,
        action: ReferralAction,
    },

    #[error("Unknown referral action: {0}")]
    UnknownReferralAction(String),

    #[error("Only the receiving doctor can act on this referral")]
    NotReferralRecipient,

    #[error("Only the assigned doctor can {0}")]
    NotAssignedDoctor(String),

    #[error("Appointment already has an open referral")]
    ReferralAlreadyOpen,

    #[error("A report already exists for this appointment")]
    ReportExists,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("PDF rendering failed: {0}")]
    PdfError(String),
}

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound
            | AppointmentError::PatientNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::ReferralNotFound
            | AppointmentError::ReportNotFound => AppError::NotFound(e.to_string()),
            AppointmentError::SlotConflict(msg) => AppError::Conflict(msg),
            AppointmentError::NotModifiable(_)
            | AppointmentError::ReferralAlreadyOpen
            | AppointmentError::ReportExists => AppError::Conflict(e.to_string()),
            AppointmentError::InvalidTime(_)
            | AppointmentError::InvalidDuration
            | AppointmentError::EndsAfterMidnight(_)
            | AppointmentError::InvalidStatusUpdate(_)
            | AppointmentError::InvalidTransition { .. }
            | AppointmentError::UnknownReferralAction(_) => AppError::BadRequest(e.to_string()),
            AppointmentError::NotReferralRecipient
            | AppointmentError::NotAssignedDoctor(_)
            | AppointmentError::Unauthorized => AppError::Forbidden(e.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
            AppointmentError::PdfError(msg) => AppError::Internal(msg),
        }
    }
}
