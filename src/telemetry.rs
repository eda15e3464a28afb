//! 日志与追踪系统
//! 初始化结构化日志和指标描述

use crate::config::LoggingConfig;
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const LOGIN_ATTEMPTS_TOTAL: &str = "auth_login_attempts_total";
pub const SESSIONS_ISSUED_TOTAL: &str = "auth_sessions_issued_total";
pub const RATE_LIMITED_TOTAL: &str = "rate_limited_requests_total";

/// 初始化日志与追踪系统
///
/// `RUST_LOG` takes precedence over `logging.level` when it is set.
pub fn init_telemetry(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let log_layer = match logging.format.to_lowercase().as_str() {
        // JSON 格式（生产环境）
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        // 美化格式（开发环境）
        _ => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(false)
            .boxed(),
    };

    // 重复初始化（例如测试中）时忽略错误
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
        return;
    }

    describe_metrics();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %logging.level,
        format = %logging.format,
        "Telemetry initialized"
    );
}

/// 注册指标说明，指标本身在首次使用时创建
fn describe_metrics() {
    metrics::describe_counter!(HTTP_REQUESTS_TOTAL, "HTTP requests by method, path and status");
    metrics::describe_histogram!(HTTP_REQUEST_DURATION, "HTTP request latency in seconds");
    metrics::describe_counter!(LOGIN_ATTEMPTS_TOTAL, "Password logins by outcome");
    metrics::describe_counter!(SESSIONS_ISSUED_TOTAL, "Access/refresh token pairs issued");
    metrics::describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by a rate limiter");
}
