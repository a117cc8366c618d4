use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::models::MAX_IMAGE_BYTES;

// Base64 inflates uploads by a third, plus room for the JSON envelope.
const IMAGE_BODY_LIMIT: usize = MAX_IMAGE_BYTES / 3 * 4 + 64 * 1024;

/// Routes nested under `/patients`, next to the patient record routes.
pub fn dental_record_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{patient_id}/medical-history", get(handlers::get_medical_history))
        .route(
            "/{patient_id}/medical-history/entries",
            post(handlers::append_history_entry),
        )
        .route(
            "/{patient_id}/medical-history/entries/{index}",
            put(handlers::update_history_entry).delete(handlers::delete_history_entry),
        )
        .route(
            "/{patient_id}/tooth-chart",
            get(handlers::get_tooth_chart).put(handlers::update_chart_notes),
        )
        .route("/{patient_id}/tooth-chart/teeth/{tooth}", put(handlers::update_tooth))
        .route(
            "/{patient_id}/images",
            get(handlers::list_images)
                .post(handlers::upload_image)
                .layer(DefaultBodyLimit::max(IMAGE_BODY_LIMIT)),
        )
        .route("/{patient_id}/images/{image_id}", delete(handlers::delete_image))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
