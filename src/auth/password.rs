//! Password hashing and verification using Argon2id

use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

use crate::config::SecurityConfig;

/// Longest password accepted, in bytes.
pub const MAX_PASSWORD_BYTES: usize = 128;

/// Lowest work factors a hasher may be configured with.
pub const MIN_MEMORY_KIB: u32 = 19 * 1024;
pub const MIN_ITERATIONS: u32 = 2;

#[derive(Debug, Error)]
pub enum PasswordError {
    /// The Argon2 primitive itself failed (e.g. allocation).
    #[error("failed to hash password: {0}")]
    Hashing(String),

    /// The stored hash is not a parsable PHC string for a supported algorithm.
    #[error("malformed password hash: {0}")]
    MalformedHash(String),

    #[error("{0}")]
    Precondition(String),
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
        }
    }
}

impl From<&SecurityConfig> for HashParams {
    fn from(security: &SecurityConfig) -> Self {
        Self {
            memory_kib: security.argon2_memory_kib,
            iterations: security.argon2_iterations,
            parallelism: security.argon2_parallelism,
        }
    }
}

/// Password hasher with configurable parameters
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create a hasher; parameters below the floor are raised to it.
    pub fn new(params: HashParams) -> Result<Self, PasswordError> {
        let params = Params::new(
            params.memory_kib.max(MIN_MEMORY_KIB),
            params.iterations.max(MIN_ITERATIONS),
            params.parallelism.max(1),
            None,
        )
        .map_err(|e| PasswordError::Hashing(format!("invalid Argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a password into a PHC string carrying salt and work factor.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        check_precondition(password)?;

        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                PasswordError::Hashing(e.to_string())
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash.
    ///
    /// Returns `Ok(false)` for a well-formed hash that does not match, and
    /// `Err(MalformedHash)` when the hash cannot be parsed or uses an
    /// unsupported algorithm/version. The comparison runs in constant time.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            PasswordError::MalformedHash(e.to_string())
        })?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::MalformedHash(e.to_string())),
        }
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, min_length: usize) -> Result<(), PasswordError> {
        if password.chars().count() < min_length {
            return Err(PasswordError::Precondition(format!(
                "password must be at least {} characters",
                min_length
            )));
        }

        check_precondition(password)
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::new(
                Algorithm::Argon2id,
                Version::V0x13,
                Params::new(64 * 1024, 3, 2, None).unwrap_or_default(),
            ),
        }
    }
}

fn check_precondition(password: &str) -> Result<(), PasswordError> {
    if password.is_empty() {
        return Err(PasswordError::Precondition("password is required".to_string()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordError::Precondition(format!(
            "password must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(HashParams {
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let password = "longenoughpassword";

        let hash = hasher.hash(password).unwrap();
        assert!(hasher.verify(password, &hash).unwrap());
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = fast_hasher();

        let hash = hasher.hash("longenoughpassword").unwrap();
        assert!(!hasher.verify("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = fast_hasher();
        let password = "longenoughpassword";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        // Hashes should be different due to salt
        assert_ne!(hash1, hash2);
        assert!(hasher.verify(password, &hash1).unwrap());
        assert!(hasher.verify(password, &hash2).unwrap());
    }

    #[test]
    fn test_params_are_raised_to_floor() {
        let hasher = PasswordHasher::new(HashParams {
            memory_kib: 8,
            iterations: 1,
            parallelism: 0,
        })
        .unwrap();

        let hash = hasher.hash("longenoughpassword").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        let params = Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), MIN_MEMORY_KIB);
        assert_eq!(params.t_cost(), MIN_ITERATIONS);
    }

    #[test]
    fn test_malformed_hash_is_distinguishable() {
        let hasher = fast_hasher();
        let result = hasher.verify("longenoughpassword", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordError::MalformedHash(_))));
    }

    #[test]
    fn test_password_policy_validation() {
        assert!(PasswordHasher::validate_password_policy("longenoughpassword", 10).is_ok());
        assert!(PasswordHasher::validate_password_policy("short", 10).is_err());
        assert!(PasswordHasher::validate_password_policy(&"x".repeat(200), 10).is_err());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            fast_hasher().hash(""),
            Err(PasswordError::Precondition(_))
        ));
    }
}
