use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Role;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::extract::{AppJson, AppPath, AppQuery};

use crate::models::{CreatePatientRequest, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(request): AppJson<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin, Role::Receptionist, Role::Doctor])?;

    let service = PatientService::new(&config);
    let patient = service.create_patient(request).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.ensure_can_read_patient(patient_id)?;

    let service = PatientService::new(&config);
    let patient = service.get_patient(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    ctx.require_staff()?;

    let service = PatientService::new(&config);
    let patient = service.update_patient(patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn delete_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin])?;

    let service = PatientService::new(&config);
    service.delete_patient(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Patient deleted"
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppQuery(query): AppQuery<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    ctx.require_staff()?;

    let service = PatientService::new(&config);
    let patients = service.search_patients(query).await?;

    Ok(Json(json!({
        "success": true,
        "total": patients.len(),
        "patients": patients
    })))
}
