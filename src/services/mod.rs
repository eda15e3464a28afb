//! Business logic services layer

pub mod auth_service;
pub mod identity_link;
pub mod session_service;

pub use auth_service::AuthService;
pub use identity_link::{ExternalIdentity, IdentityLinkService, IdentityProvider};
pub use session_service::{Session, SessionService};
