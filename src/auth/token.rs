use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};

use super::{models::LoginSessionModel, types::AuthClaims};
use crate::shared::AppError;

/// HS256 signing keys plus the lifetime given to new login sessions
#[derive(Clone)]
pub struct TokenConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    pub expiration_days: i64,
}

impl TokenConfig {
    pub fn new(secret: String, expiration_days: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiration_days,
        }
    }

    /// Signs a token for `session`; it expires together with the session row
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn issue(&self, session: &LoginSessionModel) -> Result<String, AppError> {
        let claims = AuthClaims {
            session_id: session.id.clone(),
            username: session.username.clone(),
            exp: session.expires_at.timestamp().max(0) as usize,
            iat: session.created_at.timestamp().max(0) as usize,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })
    }

    /// Checks signature and expiry only; whether the session was revoked is the caller's concern
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<AuthClaims, AppError> {
        let data = decode::<AuthClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!(error = %e, "Rejected JWT token");
            AppError::JwtError(e.to_string())
        })?;

        debug!(
            username = %data.claims.username,
            session_id = %data.claims.session_id,
            "JWT token verified"
        );
        Ok(data.claims)
    }
}
