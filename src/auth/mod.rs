//! Authentication and authorization module

pub mod cookies;
pub mod credentials;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use credentials::{BearerCredentials, ClientKind, CookieCredentials, CredentialExtractor};
pub use identity::AuthenticatedIdentity;
pub use jwt::{AccessClaims, JwtService, TokenError};
pub use middleware::{require_admin, require_auth};
pub use password::{PasswordError, PasswordHasher};
