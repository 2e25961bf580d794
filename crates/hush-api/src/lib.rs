pub mod auth;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod settings;
pub mod users;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/sign-up", post(auth::sign_up))
        .route("/api/verify-code", post(auth::verify_code))
        .route("/api/check-username-unique", get(auth::check_username_unique))
        .route("/api/sign-in", post(auth::sign_in))
        .route("/api/get-user", get(users::get_user))
        .route("/api/send-message", post(messages::send_message))
        .route("/api/get-sample-messages", get(messages::get_sample_messages))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/get-messages", get(messages::get_messages))
        .route("/api/delete-message/{message_id}", delete(messages::delete_message))
        .route(
            "/api/accept-messages",
            get(settings::get_accept_messages).post(settings::set_accept_messages),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
