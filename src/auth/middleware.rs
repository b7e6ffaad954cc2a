use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{instrument, warn};

use crate::shared::{AppError, AppState};

/// Rejects the request unless its bearer token maps to a live login session.
/// On success the `AuthClaims` are available to handlers as `Extension<AuthClaims>`.
#[instrument(skip(state, req, next), fields(uri = %req.uri()))]
pub async fn jwt_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).map(str::to_string);

    // Same check a chat socket goes through after its upgrade
    let claims = state
        .authenticator()
        .authenticate(token.as_deref())
        .await
        .inspect_err(|e| warn!(error = %e, "Request authentication failed"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
