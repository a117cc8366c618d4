use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_utils::jwt::{issue_patient_session, issue_staff_token};

use crate::models::{
    AuthError, LoginRequest, LoginResponse, PatientPortalRecord, PatientSessionRequest,
    PatientSessionResponse,
};
use crate::services::password::PasswordService;
use crate::services::users::UserService;

/// Issues staff access tokens and patient session tokens.
pub struct TokenAuthorityService {
    users: UserService,
    store: PostgrestClient,
    jwt_secret: String,
    jwt_ttl_hours: i64,
    session_secret: String,
    session_ttl_minutes: i64,
}

impl TokenAuthorityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            users: UserService::new(config),
            store: PostgrestClient::new(config),
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_hours: config.jwt_ttl_hours,
            session_secret: config.patient_session_secret.clone(),
            session_ttl_minutes: config.patient_session_ttl_minutes,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        debug!("Login attempt for {}", request.email);

        let user = self
            .users
            .find_by_email(request.email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user.password_hash.as_deref().ok_or_else(|| {
            warn!("Account {} has no password set", user.id);
            AuthError::InvalidCredentials
        })?;

        let matches = PasswordService::verify_password(&request.password, hash).map_err(|e| {
            warn!("Stored password hash for {} is unreadable: {}", user.id, e);
            AuthError::InvalidCredentials
        })?;

        if !matches {
            warn!("Failed login for account {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let access_token = issue_staff_token(
            user.id,
            &user.email,
            &user.full_name,
            user.role,
            &self.jwt_secret,
            self.jwt_ttl_hours,
        )
        .map_err(AuthError::TokenError)?;

        info!("Staff user {} logged in as {}", user.id, user.role);

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_ttl_hours * 3600,
            user,
        })
    }

    pub async fn open_patient_session(
        &self,
        request: PatientSessionRequest,
    ) -> Result<PatientSessionResponse, AuthError> {
        let patient = self.get_portal_record(request.patient_id).await?;

        let hash = patient
            .portal_code_hash
            .as_deref()
            .ok_or(AuthError::InvalidAccessCode)?;

        let matches = PasswordService::verify_password(request.access_code.trim(), hash)
            .map_err(|_| AuthError::InvalidAccessCode)?;

        if !matches {
            warn!("Invalid portal access code for patient {}", patient.id);
            return Err(AuthError::InvalidAccessCode);
        }

        let session_token =
            issue_patient_session(patient.id, &self.session_secret, self.session_ttl_minutes)
                .map_err(AuthError::TokenError)?;

        info!("Patient session opened for {}", patient.id);

        Ok(PatientSessionResponse {
            session_token,
            patient_id: patient.id,
            expires_in: self.session_ttl_minutes * 60,
        })
    }

    /// Generates a fresh portal code; only its hash is stored.
    pub async fn reset_portal_code(&self, patient_id: Uuid) -> Result<String, AuthError> {
        self.get_portal_record(patient_id).await?;

        let code = PasswordService::generate_access_code();
        let hash = PasswordService::hash_password(&code)
            .map_err(|e| AuthError::TokenError(format!("Failed to hash access code: {}", e)))?;

        let _: Vec<serde_json::Value> = self
            .store
            .update(
                "patients",
                &format!("id=eq.{}", patient_id),
                json!({
                    "portal_code_hash": hash,
                    "updated_at": Utc::now().to_rfc3339()
                }),
            )
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!("Portal access code reset for patient {}", patient_id);
        Ok(code)
    }

    async fn get_portal_record(&self, patient_id: Uuid) -> Result<PatientPortalRecord, AuthError> {
        self.store
            .select_one(
                "patients",
                &format!("id=eq.{}&select=id,portal_code_hash", patient_id),
            )
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::PatientNotFound)
    }
}
