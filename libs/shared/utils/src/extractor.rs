use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::context::{PatientIdentity, RequestContext, StaffIdentity};
use shared_models::error::AppError;

use crate::jwt::{validate_patient_session, validate_staff_token};

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    auth_value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))
}

/// Resolves either kind of bearer token into a request context.
///
/// Staff tokens are three-segment JWTs; patient sessions have two segments.
pub fn resolve_context(token: &str, config: &AppConfig) -> Result<RequestContext, AppError> {
    match token.split('.').count() {
        3 => {
            let claims = validate_staff_token(token, &config.jwt_secret).map_err(AppError::Auth)?;
            Ok(RequestContext::Staff(StaffIdentity {
                user_id: claims.sub,
                email: claims.email,
                name: claims.name,
                role: claims.role,
            }))
        }
        2 => {
            let claims = validate_patient_session(token, &config.patient_session_secret)
                .map_err(AppError::Auth)?;
            Ok(RequestContext::Patient(PatientIdentity { patient_id: claims.pid }))
        }
        _ => Err(AppError::Auth("Invalid token format".to_string())),
    }
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let context = resolve_context(&token, &config)?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Rejects patient sessions before they reach staff-only routes.
pub async fn staff_only_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    match request.extensions().get::<RequestContext>() {
        Some(RequestContext::Staff(_)) => Ok(next.run(request).await),
        Some(RequestContext::Patient(_)) => {
            Err(AppError::Forbidden("Staff access required".to_string()))
        }
        None => Err(AppError::Auth("Request context missing".to_string())),
    }
}
