//! Client kind negotiation and credential transports.
//!
//! API clients present the access token in `Authorization: Bearer`, browsers
//! carry it in the `access_token` cookie. The middleware picks the extractor
//! from the negotiated [`ClientKind`].

use axum::http::{
    header::{ACCEPT, AUTHORIZATION},
    HeaderMap,
};

use super::cookies::{read_cookie, ACCESS_COOKIE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Api,
    Browser,
}

impl ClientKind {
    /// `Api` when `application/json` is among the accepted media types.
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let wants_json = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|range| range.split(';').next())
            .any(|media| media.trim().eq_ignore_ascii_case("application/json"));

        if wants_json {
            ClientKind::Api
        } else {
            ClientKind::Browser
        }
    }

    pub fn extractor(&self) -> &'static dyn CredentialExtractor {
        match self {
            ClientKind::Api => &BearerCredentials,
            ClientKind::Browser => &CookieCredentials,
        }
    }
}

/// Pulls a raw credential out of the request headers.
pub trait CredentialExtractor: Send + Sync {
    fn extract(&self, headers: &HeaderMap) -> Option<String>;

    /// Short name for logs
    fn transport(&self) -> &'static str;
}

pub struct BearerCredentials;

impl CredentialExtractor for BearerCredentials {
    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers)
    }

    fn transport(&self) -> &'static str {
        "bearer"
    }
}

pub struct CookieCredentials;

impl CredentialExtractor for CookieCredentials {
    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, ACCESS_COOKIE)
    }

    fn transport(&self) -> &'static str {
        "cookie"
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
