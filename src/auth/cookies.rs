//! Session cookies for browser clients.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

use crate::{config::SecurityConfig, error::AppError};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// Lifetime of the OAuth `state` cookie.
const OAUTH_STATE_MAX_AGE_SECS: u64 = 10 * 60;

/// Attributes shared by every cookie the service sets.
#[derive(Debug, Clone, Copy)]
pub struct CookieSettings {
    pub secure: bool,
    pub access_max_age_secs: u64,
    pub refresh_max_age_secs: u64,
}

impl From<&SecurityConfig> for CookieSettings {
    fn from(security: &SecurityConfig) -> Self {
        Self {
            secure: security.cookie_secure,
            access_max_age_secs: security.access_token_exp_secs,
            refresh_max_age_secs: security.refresh_token_exp_days * 24 * 60 * 60,
        }
    }
}

impl CookieSettings {
    pub fn access(&self, token: &str) -> Result<HeaderValue, AppError> {
        self.build(ACCESS_COOKIE, token, self.access_max_age_secs)
    }

    pub fn refresh(&self, token: &str) -> Result<HeaderValue, AppError> {
        self.build(REFRESH_COOKIE, token, self.refresh_max_age_secs)
    }

    pub fn oauth_state(&self, state: &str) -> Result<HeaderValue, AppError> {
        self.build(OAUTH_STATE_COOKIE, state, OAUTH_STATE_MAX_AGE_SECS)
    }

    /// Expire a cookie immediately.
    pub fn clear(&self, name: &str) -> Result<HeaderValue, AppError> {
        self.build(name, "", 0)
    }

    fn build(&self, name: &str, value: &str, max_age: u64) -> Result<HeaderValue, AppError> {
        let mut cookie =
            format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).map_err(|e: InvalidHeaderValue| {
            AppError::Internal(format!("invalid {} cookie: {}", name, e))
        })
    }
}

/// Read a cookie value from every `Cookie` header on the request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
        .find(|val| !val.is_empty())
}
