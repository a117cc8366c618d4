use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, staff_only_middleware};

use crate::handlers::proxy_whatsapp_media;

pub fn create_notification_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/whatsapp/media/{media_id}", get(proxy_whatsapp_media))
        .layer(middleware::from_fn(staff_only_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
