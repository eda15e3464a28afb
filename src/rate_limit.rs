//! 基于固定窗口的 IP 限流
//! 每个限流器独立持有访客表，并由后台任务定期清理过期条目

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::{task::JoinHandle, time::Instant};

use crate::{error::AppError, telemetry};

/// 单个 IP 在当前窗口内的计数
#[derive(Debug, Clone, Copy)]
struct Visitor {
    count: u32,
    window_start: Instant,
}

/// Fixed-window limiter keyed by client address.
///
/// A window opens on the first request from an address and lasts `window`.
/// Requests are admitted while the count in the current window is at most
/// `limit`; once more than `window` has elapsed the next request opens a new
/// window.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    limit: u32,
    window: Duration,
    visitors: Mutex<HashMap<IpAddr, Visitor>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, limit: u32, window: Duration) -> Self {
        Self {
            name,
            limit,
            window,
            visitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 检查是否允许请求
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    /// Same as [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut visitors = self.lock();

        match visitors.get_mut(&ip) {
            Some(visitor) if now.saturating_duration_since(visitor.window_start) <= self.window => {
                visitor.count = visitor.count.saturating_add(1);
                visitor.count <= self.limit
            }
            _ => {
                visitors.insert(
                    ip,
                    Visitor {
                        count: 1,
                        window_start: now,
                    },
                );
                self.limit >= 1
            }
        }
    }

    /// 清理窗口已过期的访客，返回清理数量
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut visitors = self.lock();
        let before = visitors.len();
        visitors.retain(|_, v| now.saturating_duration_since(v.window_start) <= self.window);
        before - visitors.len()
    }

    /// Number of addresses currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock().len()
    }

    /// Start the periodic sweep. The task ends once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即返回
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(limiter = limiter.name, removed, "Swept stale visitors");
                }
            }
        })
    }

    // 中毒的锁仍可使用：访客表在任何时刻都是一致的
    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Visitor>> {
        self.visitors.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 限流中间件的状态：限流器与代理头信任策略
#[derive(Clone)]
pub struct RateLimitGuard {
    pub limiter: Arc<RateLimiter>,
    pub trust_proxy: bool,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>, trust_proxy: bool) -> Self {
        Self {
            limiter,
            trust_proxy,
        }
    }
}

/// 速率限制中间件
pub async fn rate_limit_middleware(
    State(guard): State<RateLimitGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_ip = client_ip(&req, guard.trust_proxy);

    if !guard.limiter.allow(client_ip) {
        tracing::warn!(
            limiter = guard.limiter.name(),
            client_ip = %client_ip,
            uri = %req.uri().path(),
            "Rate limit exceeded"
        );
        metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "limiter" => guard.limiter.name())
            .increment(1);
        return Err(AppError::RateLimited);
    }

    // 将 IP 添加到请求扩展，以便后续使用
    req.extensions_mut().insert(client_ip);

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
///
/// With `trust_proxy` the first `X-Forwarded-For` entry, then `X-Real-IP`,
/// wins over the socket address.
pub fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(addr) = forwarded_ip(req.headers()) {
            return addr;
        }
    }

    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    // 上游限流器已解析过
    if let Some(ip) = req.extensions().get::<IpAddr>() {
        return *ip;
    }

    tracing::warn!("Could not determine client IP, using loopback address");
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    from_forwarded_for.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    #[test]
    fn test_limit_then_reject() {
        let limiter = RateLimiter::new("test", 5, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..5 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert!(!limiter.allow_at(ip(1), now));

        // 其他 IP 不受影响
        assert!(limiter.allow_at(ip(2), now));
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let limiter = RateLimiter::new("test", 1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.allow_at(ip(1), start));
        assert!(!limiter.allow_at(ip(1), start + Duration::from_secs(60)));
        assert!(limiter.allow_at(ip(1), start + Duration::from_millis(60_001)));
    }

    #[test]
    fn test_sweep_removes_only_stale_entries() {
        let limiter = RateLimiter::new("test", 10, Duration::from_secs(60));
        let start = Instant::now();

        limiter.allow_at(ip(1), start);
        limiter.allow_at(ip(2), start + Duration::from_secs(30));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(61)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(limiter.sweep_at(start + Duration::from_secs(61)), 0);
    }

    #[test]
    fn test_forwarded_ip_only_when_trusted() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            client_ip(&req, true),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );
        assert_eq!(client_ip(&req, false), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_connect_info_address_used() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([198, 51, 100, 4], 5000))));

        assert_eq!(client_ip(&req, false), "198.51.100.4".parse::<IpAddr>().unwrap());
    }
}
