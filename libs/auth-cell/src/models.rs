use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: StaffUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientSessionRequest {
    pub patient_id: Uuid,
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSessionResponse {
    pub session_token: String,
    pub patient_id: Uuid,
    pub expires_in: i64,
}

/// Just the columns of a patient row that portal login needs.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientPortalRecord {
    pub id: Uuid,
    pub portal_code_hash: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid patient access code")]
    InvalidAccessCode,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("User with email {email} already exists")]
    EmailAlreadyExists { email: String },

    #[error("User not found")]
    UserNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidAccessCode => AppError::Auth(e.to_string()),
            AuthError::AccountDisabled => AppError::Forbidden(e.to_string()),
            AuthError::EmailAlreadyExists { .. } => AppError::Conflict(e.to_string()),
            AuthError::UserNotFound | AuthError::PatientNotFound => AppError::NotFound(e.to_string()),
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::TokenError(msg) => AppError::Internal(msg),
            AuthError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
