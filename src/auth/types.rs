use serde::{Deserialize, Serialize};

/// JWT claims structure containing login session information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthClaims {
    pub session_id: String,
    pub username: String,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

/// Request body for register and login
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

/// Response for register and login
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_claims_serialization() {
        let claims = AuthClaims {
            session_id: "test-id".to_string(),
            username: "alice".to_string(),
            exp: 1234567890,
            iat: 1234567800,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test-id"));

        let deserialized: AuthClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, claims);
    }
}
