//! Access token issuance/validation and opaque refresh token generation

use crate::{config::AppConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Issuer claim stamped on and required from every access token.
pub const ISSUER: &str = "fithub";

/// Shortest accepted signing secret for HS256.
pub const MIN_SECRET_LEN: usize = 32;

const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token uses an unexpected algorithm")]
    WrongAlgorithm,

    #[error("token claims are invalid")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("entropy source failed: {0}")]
    Randomness(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::WrongAlgorithm
            }
            _ => TokenError::Invalid,
        }
    }
}

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: Uuid,

    pub is_admin: bool,

    /// Issued at
    pub iat: i64,

    /// Not before
    pub nbf: i64,

    /// Expiration
    pub exp: i64,

    pub iss: String,

    /// Token id, unique per issuance
    pub jti: Uuid,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: Duration,
}

impl JwtService {
    /// Build a service around an arbitrary signing secret.
    pub fn new(secret: &str, access_token_ttl: Duration) -> Result<Self, TokenError> {
        // HS256 需要至少 32 字节的密钥
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::Signing(format!(
                "secret too short (min {} chars)",
                MIN_SECRET_LEN
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_token_ttl,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            config.security.token_secret.expose_secret(),
            Duration::seconds(config.security.access_token_exp_secs as i64),
        )
        .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Generate access token
    pub fn issue_access_token(&self, user_id: Uuid, is_admin: bool) -> Result<String, TokenError> {
        self.issue_access_token_at(user_id, is_admin, Utc::now())
    }

    /// Generate an access token as if issued at `issued_at`.
    pub fn issue_access_token_at(
        &self,
        user_id: Uuid,
        is_admin: bool,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expiration = issued_at + self.access_token_ttl;

        let claims = AccessClaims {
            sub: user_id,
            is_admin,
            iat: issued_at.timestamp(),
            nbf: issued_at.timestamp(),
            exp: expiration.timestamp(),
            iss: ISSUER.to_string(),
            jti: Uuid::new_v4(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            TokenError::Signing(e.to_string())
        })
    }

    /// Validate and decode an access token.
    ///
    /// The token is valid strictly while `now < exp`; no clock skew is granted.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                TokenError::from(e)
            })?
            .claims;

        // jsonwebtoken still accepts the exact expiry second
        if Utc::now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

/// Generate an opaque refresh token: 32 bytes from the OS CSPRNG, hex encoded.
pub fn generate_refresh_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        tracing::error!("OS entropy source failed: {:?}", e);
        TokenError::Randomness(e.to_string())
    })?;
    Ok(hex::encode(bytes))
}

/// SHA-256 digest (hex) under which a refresh token is stored and looked up.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
