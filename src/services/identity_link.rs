//! 外部身份关联：OAuth 登录时查找或创建本地账户

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    error::{AppError, Result},
    models::user::{NewUser, User},
    repository::{AuthProviderRepository, UserRepository},
};

/// What a provider tells us about the person behind an authorization code.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub provider_user_id: String,
    pub email: String,
    pub email_verified: bool,
    pub first_name: String,
    pub last_name: String,
    pub picture: Option<String>,
}

/// An OAuth identity provider. The HTTP exchange lives behind this trait.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Route segment, e.g. `google` in `/auth/google/login`
    fn name(&self) -> &str;

    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<ExternalIdentity>;
}

pub struct IdentityLinkService {
    users: Arc<dyn UserRepository>,
    links: Arc<dyn AuthProviderRepository>,
}

impl IdentityLinkService {
    pub fn new(users: Arc<dyn UserRepository>, links: Arc<dyn AuthProviderRepository>) -> Self {
        Self { users, links }
    }

    /// Resolve an external identity to a local user.
    ///
    /// An existing link wins. Otherwise an account with the same email is
    /// linked, and failing that a password-less account is created.
    pub async fn find_or_create(&self, provider: &str, identity: ExternalIdentity) -> Result<User> {
        if let Some(link) = self.links.find(provider, &identity.provider_user_id).await? {
            return self
                .users
                .find_by_id(link.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("User"));
        }

        // 未验证的邮箱不能用来接管或创建账户
        if !identity.email_verified {
            tracing::warn!(provider, "Rejected external identity with unverified email");
            return Err(AppError::Forbidden);
        }

        let email = identity.email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::validation("Missing Email"));
        }

        if let Some(user) = self.users.find_by_email(&email).await? {
            self.links
                .link(user.id, provider, &identity.provider_user_id)
                .await?;
            tracing::info!(user_id = %user.id, provider, "Linked external identity to existing account");
            return Ok(user);
        }

        let user = self
            .users
            .create_oauth_user(
                NewUser {
                    first_name: identity.first_name.trim().to_lowercase(),
                    middle_name: None,
                    last_name: identity.last_name.trim().to_lowercase(),
                    email,
                    hashed_password: None,
                    profile_image: identity.picture,
                },
                provider,
                &identity.provider_user_id,
            )
            .await?;

        tracing::info!(user_id = %user.id, provider, "Created account from external identity");
        Ok(user)
    }
}
