use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::{info, instrument};

use super::types::{AuthClaims, AuthResponse, CredentialsRequest};
use crate::shared::{AppError, AppState};

/// POST /auth/register
#[instrument(name = "register", skip(state, request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = state.auth_service.register(request).await?;
    info!(username = %response.username, "Registration completed");
    Ok(Json(response))
}

/// POST /auth/login
#[instrument(name = "login", skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = state.auth_service.login(request).await?;
    Ok(Json(response))
}

/// POST /auth/logout (behind jwt_auth)
#[instrument(name = "logout", skip(state, claims), fields(username = %claims.username))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<StatusCode, AppError> {
    state.auth_service.logout(&claims.session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
