//! Authentication core: password hashing, account operations, token
//! lifecycle, and the request-authorization middleware.

pub mod middleware;
pub mod password;
pub mod service;
pub mod tokens;

pub use middleware::{AccessToken, require_admin, require_auth};
pub use password::Hasher;
pub use service::AuthService;
pub use tokens::TokenManager;
