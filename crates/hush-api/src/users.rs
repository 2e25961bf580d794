use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use hush_types::api::{PublicUserResponse, UsernameQuery};

use crate::auth::{AppState, with_db};
use crate::error::ApiError;

/// GET /api/get-user?username= — what the public send page needs.
pub async fn get_user(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = query
        .username
        .ok_or_else(|| ApiError::invalid("Username is required"))?;

    let user = with_db(&state, move |db| db.get_public_profile(&username))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(PublicUserResponse {
        success: true,
        user,
    }))
}
