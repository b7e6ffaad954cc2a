// Public API - what other modules can use
pub use handlers::{login, logout, register};
pub use middleware::{bearer_token, jwt_auth};
pub use service::{AuthService, Authenticator};
pub use types::AuthClaims;

// Internal modules
mod handlers;
mod middleware;
pub mod models;
pub mod repository;
pub mod service;
pub mod token;
pub mod types;
