use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// MEDICAL HISTORY
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistory {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub patient_id: Uuid,
    #[serde(default)]
    pub entries: Vec<MedicalHistoryEntry>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MedicalHistory {
    pub fn empty(patient_id: Uuid) -> Self {
        Self {
            id: None,
            patient_id,
            entries: Vec::new(),
            updated_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub date: NaiveDate,
    pub notes: String,
    pub findings: Option<String>,
    pub treatment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHistoryEntryRequest {
    pub date: Option<NaiveDate>,
    pub notes: String,
    pub findings: Option<String>,
    pub treatment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateHistoryEntryRequest {
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub findings: Option<String>,
    pub treatment: Option<String>,
}

// ==============================================================================
// TOOTH CHART
// ==============================================================================

pub const FIRST_TOOTH: i32 = 1;
pub const LAST_TOOTH: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToothStatus {
    Healthy,
    Caries,
    Filled,
    Crown,
    RootCanal,
    Missing,
    Implant,
    Bridge,
    ExtractionNeeded,
}

impl fmt::Display for ToothStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ToothStatus::Healthy => "healthy",
            ToothStatus::Caries => "caries",
            ToothStatus::Filled => "filled",
            ToothStatus::Crown => "crown",
            ToothStatus::RootCanal => "root_canal",
            ToothStatus::Missing => "missing",
            ToothStatus::Implant => "implant",
            ToothStatus::Bridge => "bridge",
            ToothStatus::ExtractionNeeded => "extraction_needed",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToothRecord {
    pub status: ToothStatus,
    pub notes: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToothChart {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    #[serde(default)]
    pub teeth: BTreeMap<u8, ToothRecord>,
    pub overall_notes: Option<String>,
    pub last_review: Option<DateTime<Utc>>,
}

impl ToothChart {
    pub fn empty(patient_id: Uuid) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id: None,
            teeth: BTreeMap::new(),
            overall_notes: None,
            last_review: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateToothRequest {
    pub status: ToothStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChartNotesRequest {
    pub overall_notes: Option<String>,
}

// ==============================================================================
// PATIENT IMAGES
// ==============================================================================

pub const MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Xray,
    Intraoral,
    Extraoral,
    Scan,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientImage {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub uploaded_by: Uuid,
    pub kind: ImageKind,
    pub storage_path: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub description: Option<String>,
    pub taken_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadImageRequest {
    /// Base64 payload, optionally as a `data:<mime>;base64,` URL.
    pub image_data: String,
    pub content_type: Option<String>,
    pub kind: ImageKind,
    pub description: Option<String>,
    pub taken_at: Option<NaiveDate>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DentalRecordError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Entry index {index} is out of range (history has {len} entries)")]
    EntryIndexOutOfRange { index: usize, len: usize },

    #[error("Only the authoring doctor may modify this entry")]
    NotEntryAuthor,

    #[error("Tooth number {0} is outside 1-32")]
    InvalidToothNumber(i32),

    #[error("Unsupported image type: {0}")]
    UnsupportedImageType(String),

    #[error("Image exceeds the 15 MiB limit")]
    ImageTooLarge,

    #[error("Image data is not valid base64")]
    InvalidImageData,

    #[error("Image not found")]
    ImageNotFound,

    #[error("{0}")]
    NotPermitted(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DentalRecordError> for AppError {
    fn from(e: DentalRecordError) -> Self {
        match e {
            DentalRecordError::PatientNotFound | DentalRecordError::ImageNotFound => {
                AppError::NotFound(e.to_string())
            }
            DentalRecordError::EntryIndexOutOfRange { .. }
            | DentalRecordError::InvalidToothNumber(_)
            | DentalRecordError::UnsupportedImageType(_)
            | DentalRecordError::ImageTooLarge
            | DentalRecordError::InvalidImageData => AppError::BadRequest(e.to_string()),
            DentalRecordError::NotEntryAuthor => AppError::Forbidden(e.to_string()),
            DentalRecordError::NotPermitted(msg) => AppError::Forbidden(msg),
            DentalRecordError::ValidationError(msg) => AppError::ValidationError(msg),
            DentalRecordError::StorageError(msg) => AppError::Internal(msg),
            DentalRecordError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
