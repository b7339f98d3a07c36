//! Handlers for the `/auth` resource.

use axum::extract::State;
use axum::Json;
use partvault_core::acl::AclEngine;
use partvault_core::error::CoreError;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::verify_stored;
use crate::error::{AppError, AppResult};
use crate::handlers::blocking;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 128))]
    pub username: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub username: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/login
///
/// Check the credentials against the users files of the auth-enabled data
/// sources and return an access token.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let settings = state.settings.clone();
    let authenticator = state.authenticator.clone();
    let username = input.username.clone();
    let password = input.password;
    let valid = blocking(move || {
        AclEngine::new(&settings).authenticate(
            &username,
            &password,
            verify_stored,
            authenticator.as_ref(),
        )
    })
    .await?;

    if !valid {
        tracing::info!(username = %input.username, "Login rejected");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid username or password".into(),
        )));
    }

    let access_token = generate_access_token(&input.username, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation failed: {e}")))?;
    tracing::info!(username = %input.username, "User logged in");

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.config.jwt.expires_in(),
        user: UserInfo {
            username: input.username,
        },
    }))
}

/// GET /api/v1/auth/me
pub async fn me(user: AuthUser) -> Json<DataResponse<UserInfo>> {
    Json(DataResponse {
        data: UserInfo {
            username: user.username,
        },
    })
}
