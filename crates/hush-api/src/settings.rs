use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::info;

use hush_types::api::{AcceptMessagesRequest, AcceptMessagesResponse};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::Claims;

/// GET /api/accept-messages
pub async fn get_accept_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let accepting = with_db(&state, move |db| db.get_accepting_messages(account_id))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(AcceptMessagesResponse {
        success: true,
        message: None,
        is_accepting_message: accepting,
    }))
}

/// POST /api/accept-messages — idempotent; the stored flag becomes
/// `acceptMessages` whatever it was before.
pub async fn set_accept_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<AcceptMessagesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let accepting = req.accept_messages;

    let updated = with_db(&state, move |db| db.set_accepting_messages(account_id, accepting)).await?;
    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    info!("{} set accepting messages to {}", claims.username, accepting);
    Ok(Json(AcceptMessagesResponse {
        success: true,
        message: Some("Message acceptance status updated successfully".to_string()),
        is_accepting_message: accepting,
    }))
}
