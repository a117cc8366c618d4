use chrono::Utc;
use serde_json::{json, Map};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::Role;
use shared_models::context::RequestContext;
use shared_utils::validation::{validate_email, validate_phone};

use crate::models::{AuthError, CreateUserRequest, StaffUser, UpdateUserRequest};
use crate::services::password::PasswordService;

pub struct UserService {
    store: PostgrestClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: PostgrestClient::new(config),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<StaffUser>, AuthError> {
        let query = format!("email=eq.{}", urlencoding::encode(&email.to_lowercase()));
        self.store
            .select_one("users", &query)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<StaffUser, AuthError> {
        self.store
            .select_one("users", &format!("id=eq.{}", user_id))
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn create_user(
        &self,
        ctx: &RequestContext,
        request: CreateUserRequest,
    ) -> Result<StaffUser, AuthError> {
        let email = request.email.trim().to_lowercase();
        debug!("Creating staff account for: {}", email);

        if !validate_email(&email) {
            return Err(AuthError::ValidationError("Invalid email address".to_string()));
        }
        if request.full_name.trim().is_empty() {
            return Err(AuthError::ValidationError("Full name is required".to_string()));
        }
        if let Some(phone) = &request.phone {
            if !validate_phone(phone) {
                return Err(AuthError::ValidationError("Invalid phone number".to_string()));
            }
        }
        PasswordService::validate_password_policy(&request.password)
            .map_err(AuthError::ValidationError)?;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists { email });
        }

        let password_hash = PasswordService::hash_password(&request.password)
            .map_err(|e| AuthError::TokenError(format!("Failed to hash password: {}", e)))?;

        let now = Utc::now().to_rfc3339();
        let user: StaffUser = self
            .store
            .insert(
                "users",
                json!({
                    "email": email,
                    "full_name": request.full_name.trim(),
                    "role": request.role,
                    "phone": request.phone,
                    "password_hash": password_hash,
                    "is_active": true,
                    "created_at": now,
                    "updated_at": now
                }),
            )
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!(
            "Staff account {} ({}) created by {:?}",
            user.id,
            user.role,
            ctx.staff().map(|s| s.user_id)
        );
        Ok(user)
    }

    pub async fn update_user(
        &self,
        user_id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<StaffUser, AuthError> {
        let mut update_data = Map::new();

        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(AuthError::ValidationError("Full name cannot be empty".to_string()));
            }
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone) = request.phone {
            if !validate_phone(&phone) {
                return Err(AuthError::ValidationError("Invalid phone number".to_string()));
            }
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(role) = request.role {
            update_data.insert("role".to_string(), json!(role));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated: Vec<StaffUser> = self
            .store
            .update("users", &format!("id=eq.{}", user_id), json!(update_data))
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        updated.into_iter().next().ok_or(AuthError::UserNotFound)
    }

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<StaffUser>, AuthError> {
        let mut query = String::from("order=full_name.asc");
        if let Some(role) = role {
            query.push_str(&format!("&role=eq.{}", role));
        }

        self.store
            .select("users", &query)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }

    pub async fn list_active_doctors(&self) -> Result<Vec<StaffUser>, AuthError> {
        self.store
            .select("users", "role=eq.doctor&is_active=eq.true&order=full_name.asc")
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))
    }
}
