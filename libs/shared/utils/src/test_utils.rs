use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::context::{PatientIdentity, RequestContext, StaffIdentity};

use crate::jwt::{issue_patient_session, issue_staff_token};

pub struct TestConfig {
    pub jwt_secret: String,
    pub patient_session_secret: String,
    pub database_rest_url: String,
    pub database_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            patient_session_secret: "test-patient-session-secret".to_string(),
            database_rest_url: "http://localhost:54321".to_string(),
            database_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_store(url: &str) -> Self {
        Self {
            database_rest_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_rest_url: self.database_rest_url.clone(),
            database_service_key: self.database_service_key.clone(),
            storage_bucket: "patient-images".to_string(),
            jwt_secret: self.jwt_secret.clone(),
            jwt_ttl_hours: 12,
            patient_session_secret: self.patient_session_secret.clone(),
            patient_session_ttl_minutes: 60,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: "no-reply@clinic.test".to_string(),
            whatsapp_api_url: String::new(),
            whatsapp_access_token: String::new(),
            whatsapp_phone_number_id: String::new(),
            redis_url: None,
            notification_workers: 1,
            notification_max_attempts: 3,
            notification_backoff_seconds: 1,
            notification_max_backoff_seconds: 4,
            clinic_name: "Test Dental Clinic".to_string(),
            server_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, name: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "Dr. Test", Role::Doctor)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "Admin Test", Role::Admin)
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "Front Desk", Role::Receptionist)
    }

    pub fn to_context(&self) -> RequestContext {
        RequestContext::Staff(StaffIdentity {
            user_id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        })
    }
}

pub fn patient_context(patient_id: Uuid) -> RequestContext {
    RequestContext::Patient(PatientIdentity { patient_id })
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        issue_staff_token(
            user.id,
            &user.email,
            &user.name,
            user.role,
            secret,
            exp_hours.unwrap_or(24),
        )
        .expect("test token")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_patient_session(patient_id: Uuid, secret: &str) -> String {
        issue_patient_session(patient_id, secret, 30).expect("test patient session")
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn user_response(user_id: Uuid, email: &str, full_name: &str, role: &str) -> serde_json::Value {
        json!({
            "id": user_id,
            "email": email,
            "full_name": full_name,
            "role": role,
            "phone": null,
            "password_hash": null,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_response(patient_id: Uuid, phone: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": "Jane",
            "last_name": "Doe",
            "email": "jane.doe@example.com",
            "phone_number": phone,
            "date_of_birth": "1990-04-12",
            "gender": "female",
            "address": "1 Main Street",
            "allergies": null,
            "notes": null,
            "portal_code_hash": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: &str,
        time: &str,
        duration_minutes: i32,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": date,
            "time": time,
            "duration_minutes": duration_minutes,
            "status": "confirmed",
            "treatment_type": "checkup",
            "notes": null,
            "is_referred": false,
            "original_doctor_id": null,
            "current_referral_id": null,
            "awaiting_original_doctor": false,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::validate_staff_token;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.database_rest_url, "http://localhost:54321");
        assert!(!app_config.jwt_secret.is_empty());
        assert!(!app_config.is_email_configured());
    }

    #[test]
    fn test_user_context() {
        let user = TestUser::doctor("doc@example.com");
        let ctx = user.to_context();
        assert!(ctx.is_user(user.id));
        assert_eq!(ctx.role(), Some(Role::Doctor));
    }

    #[test]
    fn test_jwt_token_creation() {
        let config = TestConfig::default();
        let user = TestUser::admin("admin@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(validate_staff_token(&token, &config.jwt_secret).unwrap().sub, user.id);
    }
}
