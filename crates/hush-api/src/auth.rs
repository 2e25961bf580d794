use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use rand_core::OsRng;
use tracing::{error, info, warn};
use uuid::Uuid;

use hush_db::{Database, NewSignup, SignupOutcome, VerifyOutcome};
use hush_types::api::{
    ApiResponse, SessionUser, SignInRequest, SignInResponse, SignupRequest, UsernameQuery,
    VerifyCodeRequest,
};
use hush_types::models::Account;
use hush_types::validation::{
    validate_email, validate_password, validate_username, validate_verify_code,
};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::mailer::Mailer;
use crate::middleware::create_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub mailer: Arc<dyn Mailer>,
    /// How long a freshly issued verification code stays valid.
    pub verify_code_ttl: chrono::Duration,
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}

/// Six digits, never starting with zero.
pub fn generate_verify_code() -> String {
    rand::rng().random_range(100_000..1_000_000u32).to_string()
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

/// POST /api/sign-up
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username).map_err(ApiError::invalid)?;
    validate_email(&req.email).map_err(ApiError::invalid)?;
    validate_password(&req.password).map_err(ApiError::invalid)?;

    let now = chrono::Utc::now();
    let code = generate_verify_code();
    let expiry = now + state.verify_code_ttl;

    let SignupRequest {
        username,
        email,
        password,
    } = req;
    let new = NewSignup {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash: String::new(),
        verify_code: code,
        verify_code_expiry: expiry,
    };

    // Hash on the blocking pool, together with the write.
    let (outcome, new) = with_db(&state, move |db| {
        let mut new = new;
        new.password_hash = hash_password(&password)?;
        let outcome = db.signup(&new, now)?;
        Ok((outcome, new))
    })
    .await?;

    match outcome {
        SignupOutcome::UsernameTaken => {
            return Err(ApiError::conflict("Username is already taken"));
        }
        SignupOutcome::EmailTaken => {
            return Err(ApiError::conflict("User already exists with this email"));
        }
        SignupOutcome::Created(id) => {
            info!("Account {} created for {}, pending verification", id, new.username);
        }
        SignupOutcome::Replaced(id) => {
            info!("Account {} re-issued a verification code for {}", id, new.username);
        }
    }

    if let Err(e) = state
        .mailer
        .send_verification(&new.email, &new.username, &new.verify_code)
        .await
    {
        warn!("Failed to send verification email to {}: {:#}", new.email, e);
        return Err(ApiError::NotificationFailed);
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully. Please verify your account",
        )),
    ))
}

/// POST /api/verify-code
pub async fn verify_code(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username).map_err(ApiError::invalid)?;
    validate_verify_code(&req.code).map_err(ApiError::invalid)?;

    let now = chrono::Utc::now();
    let username = req.username.clone();
    let code = req.code;
    let outcome = with_db(&state, move |db| db.verify_account(&username, &code, now)).await?;

    match outcome {
        VerifyOutcome::Verified => {
            info!("Account {} verified", req.username);
            Ok(Json(ApiResponse::ok("Account verified successfully")))
        }
        VerifyOutcome::NotFound => Err(ApiError::not_found("User not found")),
        VerifyOutcome::AlreadyVerified => Err(ApiError::AlreadyVerified),
        VerifyOutcome::Expired => Err(ApiError::Expired),
        VerifyOutcome::Mismatch => Err(ApiError::Mismatch),
    }
}

/// GET /api/check-username-unique?username=
pub async fn check_username_unique(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = query
        .username
        .ok_or_else(|| ApiError::invalid("Username is required"))?;
    validate_username(&username).map_err(ApiError::invalid)?;

    let taken = with_db(&state, move |db| db.is_username_taken(&username)).await?;
    if taken {
        return Err(ApiError::conflict("Username is already taken"));
    }

    Ok(Json(ApiResponse::ok("Username is available")))
}

enum SignInCheck {
    NoAccount,
    Unverified,
    WrongPassword,
    Passed(Account),
}

/// POST /api/sign-in — `identifier` is a username or an email.
pub async fn sign_in(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.identifier.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid("Identifier and password are required"));
    }

    let SignInRequest {
        identifier,
        password,
    } = req;

    // Argon2 verification is CPU-bound; keep it on the blocking pool.
    let check = with_db(&state, move |db| {
        let Some(row) = db.find_account_by_identifier(&identifier)? else {
            return Ok(SignInCheck::NoAccount);
        };
        if !row.is_verified {
            return Ok(SignInCheck::Unverified);
        }

        let parsed_hash = PasswordHash::new(&row.password_hash)
            .map_err(|e| anyhow::anyhow!("stored hash for {} unreadable: {}", row.username, e))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Ok(SignInCheck::WrongPassword);
        }

        Ok(SignInCheck::Passed(row.into_account()?))
    })
    .await?;

    let account = match check {
        SignInCheck::Passed(account) => account,
        SignInCheck::NoAccount => {
            return Err(ApiError::not_found("No user found with this username or email"));
        }
        SignInCheck::Unverified => return Err(ApiError::Unverified),
        SignInCheck::WrongPassword => return Err(ApiError::InvalidCredential),
    };

    let token = create_token(&state.jwt_secret, account.id, &account.username)?;
    info!("{} signed in", account.username);

    Ok(Json(SignInResponse {
        success: true,
        message: "Signed in successfully".to_string(),
        token,
        user: SessionUser {
            id: account.id,
            username: account.username,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_codes_are_six_digits() {
        for _ in 0..1000 {
            let code = generate_verify_code();
            assert!(validate_verify_code(&code).is_ok(), "bad code {code}");
            assert!(!code.starts_with('0'));
        }
    }

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            mailer: Arc::new(crate::mailer::LogMailer),
            verify_code_ttl: chrono::Duration::minutes(10),
        })
    }

    fn seed_verified(state: &AppState, username: &str, password_hash: String) {
        let now = chrono::Utc::now();
        let new = NewSignup {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@x.com"),
            password_hash,
            verify_code: "123456".into(),
            verify_code_expiry: now + chrono::Duration::minutes(10),
        };
        state.db.signup(&new, now).unwrap();
        state.db.verify_account(username, "123456", now).unwrap();
    }

    async fn sign_in_err(state: &AppState, identifier: &str, password: &str) -> ApiError {
        let req = SignInRequest {
            identifier: identifier.into(),
            password: password.into(),
        };
        match sign_in(State(state.clone()), JsonBody(req)).await {
            Ok(_) => panic!("sign-in for {identifier} should have failed"),
            Err(e) => e,
        }
    }

    #[tokio::test]
    async fn sign_in_checks_password_on_blocking_pool() {
        let state = test_state();
        seed_verified(&state, "alice", hash_password("secret1").unwrap());

        let req = SignInRequest {
            identifier: "alice@x.com".into(),
            password: "secret1".into(),
        };
        assert!(sign_in(State(state.clone()), JsonBody(req)).await.is_ok());

        assert!(matches!(
            sign_in_err(&state, "alice", "secret2").await,
            ApiError::InvalidCredential
        ));
        assert!(matches!(
            sign_in_err(&state, "nobody", "secret1").await,
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn unreadable_stored_hash_is_internal() {
        let state = test_state();
        seed_verified(&state, "mallory", "not-a-phc-string".into());

        assert!(matches!(
            sign_in_err(&state, "mallory", "secret1").await,
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("secret1").unwrap();
        assert!(!hash.contains("secret1"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"secret1", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"secret2", &parsed).is_err());
    }
}
