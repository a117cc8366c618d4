use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{PatientSessionClaims, Role, StaffClaims};

type HmacSha256 = Hmac<Sha256>;

pub fn issue_staff_token(
    user_id: Uuid,
    email: &str,
    name: &str,
    role: Role,
    jwt_secret: &str,
    ttl_hours: i64,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = StaffClaims {
        sub: user_id,
        email: email.to_string(),
        name: name.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| format!("Failed to sign token: {}", e))
}

pub fn validate_staff_token(token: &str, jwt_secret: &str) -> Result<StaffClaims, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<StaffClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        debug!("Staff token rejected: {}", e);
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token expired".to_string(),
            jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
            _ => "Invalid token".to_string(),
        }
    })?;

    debug!("Staff token validated for user: {}", data.claims.sub);
    Ok(data.claims)
}

/// Issues a compact `payload.signature` patient session token.
pub fn issue_patient_session(
    patient_id: Uuid,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, String> {
    if secret.is_empty() {
        return Err("Patient session secret is not set".to_string());
    }

    let claims = PatientSessionClaims {
        pid: patient_id,
        exp: (Utc::now() + Duration::minutes(ttl_minutes)).timestamp(),
    };

    let payload = serde_json::to_vec(&claims).map_err(|e| format!("Failed to encode session: {}", e))?;
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(payload_b64.as_bytes());
    let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

pub fn validate_patient_session(token: &str, secret: &str) -> Result<PatientSessionClaims, String> {
    if secret.is_empty() {
        return Err("Patient session secret is not set".to_string());
    }

    let (payload_b64, signature_b64) = token
        .split_once('.')
        .ok_or_else(|| "Invalid session format".to_string())?;

    if signature_b64.contains('.') {
        return Err("Invalid session format".to_string());
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode session signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(payload_b64.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Session signature verification failed");
        return Err("Invalid session signature".to_string());
    }

    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| "Invalid session encoding".to_string())?;

    let claims: PatientSessionClaims = serde_json::from_slice(&payload).map_err(|e| {
        debug!("Failed to parse session claims: {}", e);
        "Invalid session format".to_string()
    })?;

    let now = Utc::now().timestamp();
    if claims.exp < now {
        debug!("Session expired at {} (now: {})", claims.exp, now);
        return Err("Session expired".to_string());
    }

    Ok(claims)
}
