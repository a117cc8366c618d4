use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::Role;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::extract::{AppJson, AppPath, AppQuery};

use crate::models::{
    AppointmentSearchQuery, BookAppointmentRequest, ConflictCheckQuery, CreateReferralRequest,
    CreateReportRequest, ReferralAction, ReferralListQuery, RescheduleRequest, UpdateStatusRequest,
};
use crate::router::AppointmentState;
use crate::services::{AppointmentBookingService, ReferralService, ReportService};

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(request): AppJson<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let appointment = service.book_appointment(&ctx, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let appointment = service.get_appointment(&ctx, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppQuery(query): AppQuery<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let appointments = service.search_appointments(staff, &query).await?;

    Ok(Json(json!({
        "success": true,
        "total": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let appointment = service.update_status(staff, appointment_id, request.status).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let appointment = service.reschedule_appointment(staff, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    ctx.require_any_role(&[Role::Admin])?;

    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    service.delete_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted"
    })))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppQuery(query): AppQuery<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&state.config, state.notifier.clone());
    let result = service.check_conflicts(query).await?;

    let mut body = json!({
        "success": true,
        "is_available": result.is_available,
        "reason": result.reason
    });
    // The clashing booking may belong to another patient
    if ctx.staff().is_some() {
        body["conflicting_appointment_id"] = json!(result.conflicting_appointment_id);
    }

    Ok(Json(body))
}

// ==============================================================================
// REPORT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_report(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateReportRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = ReportService::new(&state.config, state.notifier.clone());
    let report = service.create_report(doctor, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

#[axum::debug_handler]
pub async fn get_report(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ReportService::new(&state.config, state.notifier.clone());
    let report = service.get_report(&ctx, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

#[axum::debug_handler]
pub async fn download_report_pdf(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Response, AppError> {
    let service = ReportService::new(&state.config, state.notifier.clone());
    let (filename, pdf) = service.render_pdf(&ctx, appointment_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        pdf,
    )
        .into_response())
}

// ==============================================================================
// REFERRAL HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_referral(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppJson(request): AppJson<CreateReferralRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = ReferralService::new(&state.config);
    let outcome = service.create_referral(doctor, request).await?;

    Ok(Json(json!({
        "success": true,
        "referral": outcome.referral,
        "appointment": outcome.appointment
    })))
}

#[axum::debug_handler]
pub async fn list_referrals(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppQuery(query): AppQuery<ReferralListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctor = ctx.require_doctor()?;

    let service = ReferralService::new(&state.config);
    let referrals = service.list_referrals(doctor, &query).await?;

    Ok(Json(json!({
        "success": true,
        "total": referrals.len(),
        "referrals": referrals
    })))
}

#[axum::debug_handler]
pub async fn get_referral(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(referral_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let staff = ctx.require_staff()?;

    let service = ReferralService::new(&state.config);
    let referral = service.get_referral(staff, referral_id).await?;

    Ok(Json(json!({
        "success": true,
        "referral": referral
    })))
}

#[axum::debug_handler]
pub async fn act_on_referral(
    State(state): State<AppointmentState>,
    Extension(ctx): Extension<RequestContext>,
    AppPath((referral_id, action)): AppPath<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let action: ReferralAction = action.parse()?;
    let doctor = ctx.require_doctor()?;

    let service = ReferralService::new(&state.config);
    let outcome = service.apply_action(doctor, referral_id, action).await?;

    Ok(Json(json!({
        "success": true,
        "referral": outcome.referral,
        "appointment": outcome.appointment
    })))
}
