use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{LoginSessionModel, UserModel},
    repository::AccountRepository,
    token::TokenConfig,
    types::{AuthClaims, AuthResponse, CredentialsRequest},
};
use crate::shared::{is_word, AppError};

const MAX_USERNAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;

/// Resolves a raw bearer token into an identity
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthClaims, AppError>;
}

/// Service for account registration, login and token validation
pub struct AuthService {
    repository: Arc<dyn AccountRepository + Send + Sync>,
    token_config: TokenConfig,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(
        repository: Arc<dyn AccountRepository + Send + Sync>,
        token_config: TokenConfig,
        hash_cost: u32,
    ) -> Self {
        Self {
            repository,
            token_config,
            hash_cost,
        }
    }

    /// Creates an account and logs it in
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: CredentialsRequest) -> Result<AuthResponse, AppError> {
        validate_username(&request.username)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(request.password, self.hash_cost).await?;
        let user = UserModel::new(request.username, password_hash);
        self.repository.create_user(&user).await?;

        info!(username = %user.username, "User registered");
        self.start_login_session(user.username).await
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: CredentialsRequest) -> Result<AuthResponse, AppError> {
        let invalid = || AppError::Unauthorized("Invalid username or password".to_string());

        let user = self
            .repository
            .get_user(&request.username)
            .await?
            .ok_or_else(invalid)?;

        if !verify_password(request.password, user.password_hash.clone()).await? {
            warn!(username = %user.username, "Login rejected: wrong password");
            return Err(invalid());
        }

        info!(username = %user.username, "User logged in");
        self.start_login_session(user.username).await
    }

    /// Revokes the login session so its token stops authenticating
    #[instrument(skip(self))]
    pub async fn logout(&self, session_id: &str) -> Result<(), AppError> {
        self.repository.delete_login_session(session_id).await?;
        info!(session_id = %session_id, "Login session revoked");
        Ok(())
    }

    /// Validates a token and checks its login session is still live
    #[instrument(skip(self, token))]
    pub async fn validate_session(&self, token: &str) -> Result<AuthClaims, AppError> {
        let claims = self.token_config.verify(token)?;

        match self.repository.get_login_session(&claims.session_id).await? {
            Some(session) if session.is_expired() => {
                warn!(session_id = %claims.session_id, "Login session has expired");
                Err(AppError::Unauthorized("Session has expired".to_string()))
            }
            Some(_) => Ok(claims),
            None => {
                warn!(
                    session_id = %claims.session_id,
                    "Login session not found - may have been revoked"
                );
                Err(AppError::Unauthorized(
                    "Session not found or has been revoked".to_string(),
                ))
            }
        }
    }

    async fn start_login_session(&self, username: String) -> Result<AuthResponse, AppError> {
        let session = LoginSessionModel::new(username, self.token_config.expiration_days);
        self.repository.create_login_session(&session).await?;

        let token = self.token_config.issue(&session)?;

        Ok(AuthResponse {
            token,
            username: session.username,
        })
    }
}

#[async_trait]
impl Authenticator for AuthService {
    async fn authenticate(&self, token: Option<&str>) -> Result<AuthClaims, AppError> {
        match token {
            Some(token) => self.validate_session(token).await,
            None => Err(AppError::Unauthorized(
                "Missing authentication token".to_string(),
            )),
        }
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if !is_word(username) || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Username must be 1-{} word characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(())
}

// bcrypt is CPU bound, keep it off the async workers
async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|_| AppError::Internal)?
        .map_err(|e| {
            warn!(error = %e, "Password hashing failed");
            AppError::Internal
        })
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|_| AppError::Internal)
}
