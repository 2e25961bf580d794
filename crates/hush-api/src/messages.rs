use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hush_db::AppendOutcome;
use hush_types::api::{ApiResponse, MessagesResponse, SampleMessagesResponse, SendMessageRequest};
use hush_types::models::SampleMessage;
use hush_types::validation::validate_message_content;

use crate::auth::{AppState, with_db};
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::Claims;

const SAMPLE_LIMIT: u32 = 10;

/// POST /api/send-message — anonymous, no session needed. The sender is
/// never recorded.
pub async fn send_message(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_message_content(&req.content).map_err(ApiError::invalid)?;

    let message_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    let SendMessageRequest { username, content } = req;

    let target = username.clone();
    let outcome = with_db(&state, move |db| {
        db.append_message(&target, message_id, &content, now)
    })
    .await?;

    match outcome {
        AppendOutcome::Appended(message) => {
            debug!("Message {} delivered to {}", message.id, username);
            Ok((StatusCode::CREATED, Json(ApiResponse::ok("Message sent successfully"))))
        }
        AppendOutcome::NotFound => Err(ApiError::not_found("User not found")),
        AppendOutcome::NotAccepting => Err(ApiError::NotAccepting),
    }
}

/// GET /api/get-messages — the caller's inbox, newest first.
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id = claims.sub;
    let messages = with_db(&state, move |db| {
        if db.get_account_by_id(account_id)?.is_none() {
            return Ok(None);
        }
        db.list_messages(account_id).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

/// DELETE /api/delete-message/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let message_id: Uuid = message_id
        .parse()
        .map_err(|_| ApiError::invalid("Invalid message id"))?;

    let account_id = claims.sub;
    let deleted = with_db(&state, move |db| db.delete_message(account_id, message_id)).await?;
    if !deleted {
        return Err(ApiError::not_found("Message not found or already deleted"));
    }

    info!("Message {} deleted by {}", message_id, claims.username);
    Ok(Json(ApiResponse::ok("Message deleted successfully")))
}

/// GET /api/get-sample-messages — display-only; falls back to built-in
/// samples when the store can't be read.
pub async fn get_sample_messages(State(state): State<AppState>) -> impl IntoResponse {
    let messages = match with_db(&state, |db| db.sample_messages(SAMPLE_LIMIT)).await {
        Ok(mut messages) => {
            messages.shuffle(&mut rand::rng());
            messages
        }
        Err(e) => {
            warn!("Falling back to built-in sample messages: {}", e);
            fallback_samples()
        }
    };

    Json(SampleMessagesResponse {
        success: true,
        messages,
    })
}

fn fallback_samples() -> Vec<SampleMessage> {
    let now = chrono::Utc::now();
    [
        "This is a sample anonymous message. Share your link to start receiving messages!",
        "Anonymous messages let people say what they really think.",
        "Connect with friends and get honest feedback, no names attached.",
    ]
    .into_iter()
    .map(|content| SampleMessage {
        content: content.to_string(),
        created_at: now,
        username: "sample".to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http_body_util::BodyExt;

    use super::*;
    use crate::auth::AppStateInner;
    use crate::mailer::LogMailer;
    use hush_db::Database;
    use hush_types::validation::{MESSAGE_MAX_LEN, MESSAGE_MIN_LEN};

    #[tokio::test]
    async fn unreadable_store_serves_built_in_samples() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE messages;")?;
            Ok(())
        })
        .unwrap();
        let state: AppState = Arc::new(AppStateInner {
            db,
            jwt_secret: "test-secret".into(),
            mailer: Arc::new(LogMailer),
            verify_code_ttl: chrono::Duration::minutes(10),
        });

        let resp = get_sample_messages(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], true);
        let contents: Vec<_> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<_> = fallback_samples().into_iter().map(|s| s.content).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn fallback_samples_are_valid_messages() {
        let samples = fallback_samples();
        assert_eq!(samples.len(), 3);
        for s in samples {
            let len = s.content.chars().count();
            assert!((MESSAGE_MIN_LEN..=MESSAGE_MAX_LEN).contains(&len));
        }
    }
}
