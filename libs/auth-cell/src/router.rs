use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/patient-session", post(handlers::open_patient_session))
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/me", get(handlers::me))
        .route("/patients/{patient_id}/portal-code", post(handlers::reset_portal_code))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_user).get(handlers::list_users))
        .route("/doctors", get(handlers::list_doctors))
        .route("/{user_id}", get(handlers::get_user).put(handlers::update_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
