//! 认证 API 集成测试

use axum::http::{header, StatusCode};
use serde_json::json;

mod common;
use common::{api_request, body_json, json_request, TestApp, TEST_PASSWORD};

#[tokio::test]
async fn test_register_returns_session() {
    let app = TestApp::new();

    let json = app.register("Alice@Example.com").await;

    assert!(json["id"].is_string());
    assert_eq!(json["first_name"], "test");
    assert_eq!(json["email"], "alice@example.com");
    assert!(json.get("middle_name").is_none());
    assert!(json["access_token"].is_string());
    assert_eq!(json["refresh_token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    app.register("dup@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/register",
            None,
            json!({
                "first_name": "Other",
                "last_name": "Person",
                "email": "DUP@example.com",
                "password": TEST_PASSWORD,
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Email already registered");
}

#[tokio::test]
async fn test_register_validation_messages() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/register",
            None,
            json!({ "last_name": "User", "email": "a@example.com", "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing First Name");

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/register",
            None,
            json!({
                "first_name": "Test",
                "last_name": "User",
                "email": "a@example.com",
                "password": "short",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "password must be at least 10 characters"
    );
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = TestApp::new();

    let response = app
        .send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/api/v1/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "malformed request");
}

#[tokio::test]
async fn test_login_success() {
    let app = TestApp::new();
    app.register("login@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/login",
            None,
            json!({ "email": "login@example.com", "password": TEST_PASSWORD }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["email"], "login@example.com");
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.register("known@example.com").await;

    let wrong_password = app
        .send(json_request(
            "POST",
            "/api/v1/login",
            None,
            json!({ "email": "known@example.com", "password": "not the password" }),
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            "POST",
            "/api/v1/login",
            None,
            json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }),
        ))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a, b);
    assert_eq!(a["error"], "Incorrect email or password");
}

#[tokio::test]
async fn test_refresh_then_revoke_flow() {
    let app = TestApp::new();
    let session = app.register("flow@example.com").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();
    let first_access = session["access_token"].as_str().unwrap();

    // 立即刷新：同一秒内签发的令牌也必须不同
    let response = app
        .send(api_request("POST", "/api/v1/refresh", Some(refresh_token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = body_json(response).await;
    let new_access = refreshed["access_token"].as_str().unwrap();
    assert_ne!(new_access, first_access);

    // 新访问令牌可用于受保护接口
    let response = app
        .send(api_request("GET", "/api/v1/goals", Some(new_access)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // 刷新令牌未轮换，撤销后不可再用
    let response = app
        .send(api_request("POST", "/api/v1/revoke", Some(refresh_token)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(api_request("POST", "/api/v1/refresh", Some(refresh_token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid refresh token");

    // 重复撤销仍然成功
    let response = app
        .send(api_request("POST", "/api/v1/revoke", Some(refresh_token)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_refresh_without_bearer_is_bad_request() {
    let app = TestApp::new();

    let response = app.send(api_request("POST", "/api/v1/refresh", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing refresh token");

    let response = app
        .send(api_request("POST", "/api/v1/refresh", Some("unknown-token")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_reflects_current_admin_flag() {
    let app = TestApp::new();
    let session = app.register("promoted@example.com").await;
    let user_id = session["id"].as_str().unwrap().parse().unwrap();

    app.store.set_admin(user_id, true).await.unwrap();

    let response = app
        .send(api_request(
            "POST",
            "/api/v1/refresh",
            session["refresh_token"].as_str(),
        ))
        .await;
    let access = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let claims = app.state.jwt.validate_access_token(&access).unwrap();
    assert!(claims.is_admin);
}

#[tokio::test]
async fn test_expired_refresh_token_rejected() {
    let app = TestApp::new();
    let session = app.register("expired@example.com").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    app.store
        .expire_refresh_token(
            &fithub::auth::jwt::hash_refresh_token(refresh_token),
            chrono::Utc::now() - chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

    let response = app
        .send(api_request("POST", "/api/v1/refresh", Some(refresh_token)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_missing_and_invalid_access_token() {
    let app = TestApp::new();

    let response = app.send(api_request("GET", "/api/v1/workouts", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Missing access token");

    let response = app
        .send(api_request("GET", "/api/v1/workouts", Some("garbage")))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid access token");
}

#[tokio::test]
async fn test_api_expired_access_token() {
    let app = TestApp::new();
    let session = app.register("stale@example.com").await;
    let user_id = session["id"].as_str().unwrap().parse().unwrap();

    let stale = app
        .state
        .jwt
        .issue_access_token_at(
            user_id,
            false,
            chrono::Utc::now() - chrono::Duration::seconds(901),
        )
        .unwrap();

    let response = app
        .send(api_request("GET", "/api/v1/workouts", Some(&stale)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid access token");
}

#[tokio::test]
async fn test_admin_route_requires_admin() {
    let app = TestApp::new();
    let session = app.register("regular@example.com").await;
    let user_id = session["id"].as_str().unwrap();
    let access = session["access_token"].as_str().unwrap();

    let uri = format!("/api/v1/admin/users/{}", user_id);
    let response = app.send(api_request("GET", &uri, Some(access))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // 提升为管理员后重新签发令牌
    let id = user_id.parse().unwrap();
    app.store.set_admin(id, true).await.unwrap();
    let admin_token = app.state.jwt.issue_access_token(id, true).unwrap();

    let response = app.send(api_request("GET", &uri, Some(&admin_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["email"], "regular@example.com");
    assert_eq!(json["is_admin"], true);
    assert_eq!(json["has_password"], true);
}

#[tokio::test]
async fn test_update_and_delete_account() {
    let app = TestApp::new();
    let session = app.register("me@example.com").await;
    let access = session["access_token"].as_str().unwrap();
    let refresh = session["refresh_token"].as_str().unwrap();

    let response = app
        .send(json_request(
            "PUT",
            "/api/v1/users",
            Some(access),
            json!({ "first_name": "Renamed", "last_name": "  " }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["first_name"], "renamed");
    assert_eq!(json["last_name"], "user");

    let response = app
        .send(api_request("DELETE", "/api/v1/users", Some(access)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // 删除账户会撤销其刷新令牌
    let response = app
        .send(api_request("POST", "/api/v1/refresh", Some(refresh)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/login",
            None,
            json!({ "email": "me@example.com", "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_secure_headers_present() {
    let app = TestApp::new();

    let response = app.send(api_request("GET", "/api/v1/healthz", None)).await;

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}
