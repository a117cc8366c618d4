use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::context::RequestContext;
use shared_models::error::AppError;
use shared_utils::extract::AppPath;

use crate::services::WhatsappClient;

/// Streams a WhatsApp media object back to staff without exposing the
/// provider token to the browser.
#[axum::debug_handler]
pub async fn proxy_whatsapp_media(
    State(config): State<Arc<AppConfig>>,
    Extension(ctx): Extension<RequestContext>,
    AppPath(media_id): AppPath<String>,
) -> Result<Response, AppError> {
    ctx.require_staff()?;

    if media_id.is_empty() || !media_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::BadRequest("Invalid media id".to_string()));
    }
    debug!("Proxying WhatsApp media {}", media_id);

    let client = WhatsappClient::new(&config)?;
    let media = client.download_media(&media_id).await?;

    Ok(([(header::CONTENT_TYPE, media.mime_type)], media.bytes).into_response())
}
