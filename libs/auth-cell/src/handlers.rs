use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, TokenResponse};
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::extract::{AppJson, AppPath, AppQuery};
use shared_utils::extractor::{extract_bearer_token, resolve_context};

use crate::models::{
    CreateUserRequest, LoginRequest, PatientSessionRequest, UpdateUserRequest, UserListQuery,
};
use crate::services::{TokenAuthorityService, UserService};

// ==============================================================================
// TOKEN HANDLERS
// ==============================================================================

pub async fn login(
    State(config): State<Arc<AppConfig>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TokenAuthorityService::new(&config);
    let response = service.login(request).await?;

    Ok(Json(json!({
        "success": true,
        "session": response
    })))
}

pub async fn open_patient_session(
    State(config): State<Arc<AppConfig>>,
    AppJson(request): AppJson<PatientSessionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = TokenAuthorityService::new(&config);
    let response = service.open_patient_session(request).await?;

    Ok(Json(json!({
        "success": true,
        "session": response
    })))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let response = match resolve_context(&token, &config)? {
        RequestContext::Staff(staff) => TokenResponse {
            valid: true,
            subject_id: staff.user_id,
            kind: "staff".to_string(),
            email: Some(staff.email),
            role: Some(staff.role),
        },
        RequestContext::Patient(patient) => TokenResponse {
            valid: true,
            subject_id: patient.patient_id,
            kind: "patient".to_string(),
            email: None,
            role: None,
        },
    };

    Ok(Json(response))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = resolve_context(&token, &config).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

pub async fn me(Extension(ctx): Extension<RequestContext>) -> Result<Json<Value>, AppError> {
    let body = match ctx {
        RequestContext::Staff(staff) => json!({
            "success": true,
            "kind": "staff",
            "user_id": staff.user_id,
            "email": staff.email,
            "name": staff.name,
            "role": staff.role
        }),
        RequestContext::Patient(patient) => json!({
            "success": true,
            "kind": "patient",
            "patient_id": patient.patient_id
        }),
    };

    Ok(Json(body))
}

pub async fn reset_portal_code(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin, Role::Receptionist])?;

    let service = TokenAuthorityService::new(&config);
    let access_code = service.reset_portal_code(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient_id,
        "access_code": access_code
    })))
}

// ==============================================================================
// STAFF ACCOUNT HANDLERS
// ==============================================================================

pub async fn create_user(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(request): AppJson<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin])?;

    let service = UserService::new(&config);
    let user = service.create_user(&ctx, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}

pub async fn list_users(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppQuery(query): AppQuery<UserListQuery>,
) -> Result<Json<Value>, AppError> {
    ctx.require_staff()?;

    let service = UserService::new(&config);
    let users = service.list_users(query.role).await?;

    Ok(Json(json!({
        "success": true,
        "total": users.len(),
        "users": users
    })))
}

pub async fn list_doctors(
    State(config): State<Arc<AppConfig>>,
    Extension(_ctx): Extension<RequestContext>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&config);
    let doctors = service.list_active_doctors().await?;

    Ok(Json(json!({
        "success": true,
        "doctors": doctors
    })))
}

pub async fn get_user(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.require_staff()?;

    let service = UserService::new(&config);
    let user = service.get_user(user_id).await?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}

pub async fn update_user(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(user_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin])?;

    let service = UserService::new(&config);
    let user = service.update_user(user_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}
