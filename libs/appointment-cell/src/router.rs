use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use notification_cell::NotificationDispatcher;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Router state: configuration plus the notification producer shared by
/// booking and report handlers.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub notifier: Arc<NotificationDispatcher>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, notifier: Arc<NotificationDispatcher>) -> Self {
        Self { config, notifier }
    }
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::search_appointments).post(handlers::book_appointment),
        )
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment).delete(handlers::delete_appointment),
        )
        .route("/{appointment_id}/status", put(handlers::update_appointment_status))
        .route("/{appointment_id}/reschedule", put(handlers::reschedule_appointment))
        .route(
            "/{appointment_id}/report",
            get(handlers::get_report).post(handlers::create_report),
        )
        .route("/{appointment_id}/report/pdf", get(handlers::download_report_pdf))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn referral_routes(state: AppointmentState) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_referrals).post(handlers::create_referral),
        )
        .route("/{referral_id}", get(handlers::get_referral))
        .route("/{referral_id}/{action}", post(handlers::act_on_referral))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
