use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, referral_routes, AppointmentState};
use auth_cell::{auth_routes, user_routes};
use dental_record_cell::dental_record_routes;
use notification_cell::{create_notification_router, NotificationDispatcher};
use patient_cell::create_patient_router;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>, notifier: Arc<NotificationDispatcher>) -> Router {
    let appointments = AppointmentState::new(config.clone(), notifier);

    Router::new()
        .route("/", get(|| async { "Dental Clinic API is running!" }))
        .nest("/auth", auth_routes(config.clone()))
        .nest("/users", user_routes(config.clone()))
        .nest(
            "/patients",
            create_patient_router(config.clone()).merge(dental_record_routes(config.clone())),
        )
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest("/referrals", referral_routes(appointments))
        .nest("/notifications", create_notification_router(config))
}
