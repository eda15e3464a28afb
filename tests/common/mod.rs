//! 测试公共模块
//! 内存存储上的应用状态、请求构造与响应读取辅助函数

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use fithub::{
    config::{
        AppConfig, DatabaseConfig, LoggingConfig, RateLimitConfig, SecurityConfig, ServerConfig,
        StorageBackend, StorageConfig,
    },
    db,
    error::Result as AppResult,
    middleware::AppState,
    repository::{MemoryStore, Store},
    routes,
    services::{ExternalIdentity, IdentityProvider},
};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";
pub const TEST_PASSWORD: &str = "correct horse battery";

/// 创建测试配置：最低 Argon2 参数，关闭 Secure cookie
pub fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            request_timeout_secs: 10,
        },
        database: DatabaseConfig {
            url: Secret::new("postgresql://localhost/fithub_test".to_string()),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        security: SecurityConfig {
            token_secret: Secret::new(TEST_SECRET.to_string()),
            access_token_exp_secs: 900,
            refresh_token_exp_days: 60,
            password_min_length: 10,
            argon2_memory_kib: 19 * 1024,
            argon2_iterations: 2,
            argon2_parallelism: 1,
            cookie_secure: false,
            trust_proxy: false,
        },
        rate_limit: RateLimitConfig {
            auth_max_requests: 1000,
            auth_window_secs: 60,
            global_max_requests: 1000,
            global_window_secs: 60,
            sweep_interval_secs: 60,
        },
    }
}

/// Variable naming the PostgreSQL database used by repository tests.
pub const TEST_DATABASE_URL_VAR: &str = "FITHUB_TEST_DATABASE_URL";

/// 初始化测试数据库：未配置数据库地址时返回 None，调用方跳过测试
pub async fn setup_test_db() -> Option<PgPool> {
    let url = match std::env::var(TEST_DATABASE_URL_VAR) {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("{} not set, skipping database test", TEST_DATABASE_URL_VAR);
            return None;
        }
    };

    let mut config = create_test_config().database;
    config.url = Secret::new(url);

    let pool = db::create_pool(&config)
        .await
        .expect("Failed to create test database pool");

    // 运行迁移
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    // 清理测试数据
    sqlx::query(
        "TRUNCATE TABLE refresh_tokens, auth_providers, goals, body_weights, muscle_masses, \
         body_fat_percents, workouts, users CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean test database");

    Some(pool)
}

/// A test application over a fresh in-memory store.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(create_test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::build(config, Vec::new())
    }

    pub fn with_providers(providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        Self::build(create_test_config(), providers)
    }

    fn build(config: AppConfig, providers: Vec<Arc<dyn IdentityProvider>>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(
            AppState::new(config, Store::from_backend(store.clone()), providers)
                .expect("Failed to build test app state"),
        );
        let router = routes::create_router(state.clone());

        Self {
            state,
            store,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Register through the JSON API and return the response body.
    pub async fn register(&self, email: &str) -> Value {
        let response = self
            .send(json_request(
                "POST",
                "/api/v1/register",
                None,
                serde_json::json!({
                    "first_name": "Test",
                    "last_name": "User",
                    "email": email,
                    "password": TEST_PASSWORD,
                }),
            ))
            .await;
        assert_eq!(response.status(), 201, "registration failed");
        body_json(response).await
    }

    /// Register and return the access token.
    pub async fn access_token(&self, email: &str) -> String {
        self.register(email).await["access_token"]
            .as_str()
            .expect("access_token missing")
            .to_string()
    }
}

/// JSON API request; `bearer` goes into `Authorization`.
pub fn json_request(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Body-less API request.
pub fn api_request(method: &str, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::ACCEPT, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Browser form submission with optional cookies.
pub fn form_request(uri: &str, form: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::ACCEPT, "text/html")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    builder.body(Body::from(form.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is not JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// All `Set-Cookie` values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let pair = cookie.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Identity provider that accepts any code and answers with a fixed identity.
pub struct StubProvider {
    pub identity: ExternalIdentity,
}

impl StubProvider {
    pub fn verified(provider_user_id: &str, email: &str) -> Self {
        Self {
            identity: ExternalIdentity {
                provider_user_id: provider_user_id.to_string(),
                email: email.to_string(),
                email_verified: true,
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                picture: None,
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://idp.example.com/authorize?state={}", state)
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<ExternalIdentity> {
        Ok(self.identity.clone())
    }
}
