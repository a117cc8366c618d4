use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::extract::{AppJson, AppPath};

use crate::models::{
    NewHistoryEntryRequest, UpdateChartNotesRequest, UpdateHistoryEntryRequest, UpdateToothRequest,
    UploadImageRequest,
};
use crate::services::history::MedicalHistoryService;
use crate::services::images::ImageService;
use crate::services::tooth_chart::ToothChartService;

// ==============================================================================
// MEDICAL HISTORY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_medical_history(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.ensure_can_read_patient(patient_id)?;

    let service = MedicalHistoryService::new(&config);
    let history = service.get_history(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "medical_history": history
    })))
}

#[axum::debug_handler]
pub async fn append_history_entry(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<NewHistoryEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = MedicalHistoryService::new(&config);
    let history = service.append_entry(doctor, patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "medical_history": history
    })))
}

#[axum::debug_handler]
pub async fn update_history_entry(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath((patient_id, index)): AppPath<(Uuid, usize)>,
    AppJson(request): AppJson<UpdateHistoryEntryRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = MedicalHistoryService::new(&config);
    let history = service.update_entry(doctor, patient_id, index, request).await?;

    Ok(Json(json!({
        "success": true,
        "medical_history": history
    })))
}

#[axum::debug_handler]
pub async fn delete_history_entry(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath((patient_id, index)): AppPath<(Uuid, usize)>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = MedicalHistoryService::new(&config);
    let history = service.delete_entry(doctor, patient_id, index).await?;

    Ok(Json(json!({
        "success": true,
        "medical_history": history
    })))
}

// ==============================================================================
// TOOTH CHART HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_tooth_chart(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.ensure_can_read_patient(patient_id)?;

    let service = ToothChartService::new(&config);
    let chart = service.get_chart(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "tooth_chart": chart
    })))
}

#[axum::debug_handler]
pub async fn update_tooth(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath((patient_id, tooth)): AppPath<(Uuid, i32)>,
    AppJson(request): AppJson<UpdateToothRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = ToothChartService::new(&config);
    let chart = service.update_tooth(doctor.user_id, patient_id, tooth, request).await?;

    Ok(Json(json!({
        "success": true,
        "tooth_chart": chart
    })))
}

#[axum::debug_handler]
pub async fn update_chart_notes(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateChartNotesRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = ToothChartService::new(&config);
    let chart = service.update_notes(doctor.user_id, patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "tooth_chart": chart
    })))
}

// ==============================================================================
// IMAGE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn upload_image(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<UploadImageRequest>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = ImageService::new(&config);
    let image = service.upload_image(staff, patient_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "image": image
    })))
}

#[axum::debug_handler]
pub async fn list_images(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.ensure_can_read_patient(patient_id)?;

    let service = ImageService::new(&config);
    let images = service.list_images(patient_id).await?;

    Ok(Json(json!({
        "success": true,
        "total": images.len(),
        "images": images
    })))
}

#[axum::debug_handler]
pub async fn delete_image(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath((patient_id, image_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = ImageService::new(&config);
    service.delete_image(staff, patient_id, image_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Image deleted"
    })))
}
