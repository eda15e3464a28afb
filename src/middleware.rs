//! HTTP 中间件与应用状态
//! 请求追踪、安全响应头、跨源请求防护

use axum::{
    extract::{MatchedPath, Request},
    http::{
        header::{HOST, ORIGIN},
        HeaderMap, HeaderName, HeaderValue, Method,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    auth::{cookies::CookieSettings, password::HashParams, JwtService, PasswordHasher},
    config::AppConfig,
    error::{AppError, Result},
    rate_limit::RateLimiter,
    repository::Store,
    services::{AuthService, IdentityLinkService, IdentityProvider, SessionService},
    telemetry,
};

/// 应用状态
///
/// 启动后只读，通过 `Arc<AppState>` 在请求间共享。唯一的可变状态是限流器内部的访客表。
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub jwt: Arc<JwtService>,
    pub cookies: CookieSettings,
    pub sessions: Arc<SessionService>,
    pub auth_service: Arc<AuthService>,
    pub identity_links: Arc<IdentityLinkService>,
    pub identity_providers: HashMap<String, Arc<dyn IdentityProvider>>,
    pub auth_limiter: Arc<RateLimiter>,
    pub global_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wire every service over `store`.
    pub fn new(
        config: AppConfig,
        store: Store,
        providers: Vec<Arc<dyn IdentityProvider>>,
    ) -> Result<Self> {
        let security = &config.security;
        let limits = &config.rate_limit;

        let jwt = Arc::new(JwtService::from_config(&config)?);
        let hasher = Arc::new(PasswordHasher::new(HashParams::from(security))?);

        let sessions = Arc::new(SessionService::new(
            jwt.clone(),
            store.users.clone(),
            store.refresh_tokens.clone(),
            chrono::Duration::days(security.refresh_token_exp_days as i64),
        ));

        let auth_service = Arc::new(AuthService::new(
            store.users.clone(),
            sessions.clone(),
            hasher,
            security.password_min_length,
        )?);

        let identity_links = Arc::new(IdentityLinkService::new(
            store.users.clone(),
            store.auth_providers.clone(),
        ));

        let identity_providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();

        let auth_limiter = Arc::new(RateLimiter::new(
            "auth",
            limits.auth_max_requests,
            Duration::from_secs(limits.auth_window_secs),
        ));
        let global_limiter = Arc::new(RateLimiter::new(
            "global",
            limits.global_max_requests,
            Duration::from_secs(limits.global_window_secs),
        ));

        Ok(Self {
            cookies: CookieSettings::from(security),
            config,
            store,
            jwt,
            sessions,
            auth_service,
            identity_links,
            identity_providers,
            auth_limiter,
            global_limiter,
        })
    }

    pub fn identity_provider(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.identity_providers.get(name).cloned()
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let uri = req.uri().path().to_string();
    // 指标按路由模板聚合，避免路径参数造成高基数
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let elapsed = start.elapsed();

        let status = response.status();
        metrics::counter!(
            telemetry::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "path" => route,
            "status" => status.as_u16().to_string()
        )
        .increment(1);
        metrics::histogram!(telemetry::HTTP_REQUEST_DURATION).record(elapsed.as_secs_f64());

        tracing::info!(
            status = status.as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中回传 trace_id / request_id
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            headers.insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

const SECURE_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("content-security-policy", "default-src 'self'; frame-ancestors 'none'"),
];

/// 安全响应头中间件，已由处理器设置的头部不覆盖
pub async fn secure_headers_middleware(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    for (name, value) in SECURE_HEADERS {
        let name = HeaderName::from_static(name);
        if !headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }

    response
}

/// 跨源请求防护：拒绝来自其他源的状态变更请求
///
/// Safe methods always pass. Otherwise `Sec-Fetch-Site` decides when present
/// (`same-origin` and `none` pass); without it, an `Origin` must match the
/// request's host.
pub async fn cross_origin_middleware(req: Request, next: Next) -> Response {
    if is_cross_origin(req.method(), req.headers(), req.uri().authority()) {
        tracing::warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "Cross-origin request rejected"
        );
        return AppError::Forbidden.into_response();
    }

    next.run(req).await
}

fn is_cross_origin(
    method: &Method,
    headers: &HeaderMap,
    authority: Option<&axum::http::uri::Authority>,
) -> bool {
    if method == Method::GET || method == Method::HEAD || method == Method::OPTIONS {
        return false;
    }

    if let Some(site) = headers.get("sec-fetch-site") {
        return !matches!(site.to_str(), Ok("same-origin") | Ok("none"));
    }

    let Some(origin) = headers.get(ORIGIN) else {
        // 非浏览器客户端不发送 Origin
        return false;
    };

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| authority.map(|a| a.as_str()));

    let origin_host = origin
        .to_str()
        .ok()
        .and_then(|o| o.split_once("://"))
        .map(|(_, rest)| rest);

    match (origin_host, host) {
        (Some(origin_host), Some(host)) => !origin_host.eq_ignore_ascii_case(host),
        _ => true,
    }
}
