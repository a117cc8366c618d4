use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_rest_url: String,
    pub database_service_key: String,
    pub storage_bucket: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub patient_session_secret: String,
    pub patient_session_ttl_minutes: i64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub whatsapp_api_url: String,
    pub whatsapp_access_token: String,
    pub whatsapp_phone_number_id: String,
    pub redis_url: Option<String>,
    pub notification_workers: usize,
    pub notification_max_attempts: u32,
    pub notification_backoff_seconds: u64,
    pub notification_max_backoff_seconds: u64,
    pub clinic_name: String,
    pub server_port: u16,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_rest_url: required("DATABASE_REST_URL"),
            database_service_key: required("DATABASE_SERVICE_KEY"),
            storage_bucket: with_default("STORAGE_BUCKET", "patient-images"),
            jwt_secret: required("JWT_SECRET"),
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", 12),
            patient_session_secret: required("PATIENT_SESSION_SECRET"),
            patient_session_ttl_minutes: parsed("PATIENT_SESSION_TTL_MINUTES", 60),
            email_api_url: required("EMAIL_API_URL"),
            email_api_key: required("EMAIL_API_KEY"),
            email_from: with_default("EMAIL_FROM", "no-reply@clinic.local"),
            whatsapp_api_url: with_default("WHATSAPP_API_URL", "https://graph.facebook.com/v19.0"),
            whatsapp_access_token: required("WHATSAPP_ACCESS_TOKEN"),
            whatsapp_phone_number_id: required("WHATSAPP_PHONE_NUMBER_ID"),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            notification_workers: parsed("NOTIFICATION_WORKERS", 2),
            notification_max_attempts: parsed("NOTIFICATION_MAX_ATTEMPTS", 5),
            notification_backoff_seconds: parsed("NOTIFICATION_BACKOFF_SECONDS", 5),
            notification_max_backoff_seconds: parsed("NOTIFICATION_MAX_BACKOFF_SECONDS", 300),
            clinic_name: with_default("CLINIC_NAME", "Dental Clinic"),
            server_port: parsed("SERVER_PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_rest_url.is_empty()
            && !self.database_service_key.is_empty()
            && !self.jwt_secret.is_empty()
            && !self.patient_session_secret.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.whatsapp_api_url.is_empty()
            && !self.whatsapp_access_token.is_empty()
            && !self.whatsapp_phone_number_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> AppConfig {
        AppConfig {
            database_rest_url: String::new(),
            database_service_key: String::new(),
            storage_bucket: "patient-images".to_string(),
            jwt_secret: String::new(),
            jwt_ttl_hours: 12,
            patient_session_secret: String::new(),
            patient_session_ttl_minutes: 60,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: String::new(),
            whatsapp_api_url: "https://graph.facebook.com/v19.0".to_string(),
            whatsapp_access_token: String::new(),
            whatsapp_phone_number_id: String::new(),
            redis_url: None,
            notification_workers: 1,
            notification_max_attempts: 5,
            notification_backoff_seconds: 5,
            notification_max_backoff_seconds: 300,
            clinic_name: "Dental Clinic".to_string(),
            server_port: 3000,
        }
    }

    #[test]
    fn test_channels_require_credentials() {
        let mut config = blank();
        assert!(!config.is_email_configured());
        assert!(!config.is_whatsapp_configured());

        config.email_api_url = "https://mail.example.com/send".to_string();
        config.email_api_key = "key".to_string();
        assert!(config.is_email_configured());

        config.whatsapp_access_token = "token".to_string();
        assert!(!config.is_whatsapp_configured());
        config.whatsapp_phone_number_id = "1234".to_string();
        assert!(config.is_whatsapp_configured());
    }

    #[test]
    fn test_is_configured_needs_both_secrets() {
        let mut config = blank();
        config.database_rest_url = "http://localhost:3001".to_string();
        config.database_service_key = "service".to_string();
        config.jwt_secret = "secret".to_string();
        assert!(!config.is_configured());
        config.patient_session_secret = "patient-secret".to_string();
        assert!(config.is_configured());
    }
}
