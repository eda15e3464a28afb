//! 目标、指标、训练记录接口集成测试

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{api_request, body_json, json_request, TestApp};

fn goal_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "description": "Run a half marathon",
        "goal_date": "2026-12-31",
    })
}

#[tokio::test]
async fn test_goal_lifecycle() {
    let app = TestApp::new();
    let token = app.access_token("goals@example.com").await;

    let response = app
        .send(json_request("POST", "/api/v1/goals", Some(&token), goal_body("Half Marathon")))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let goal = body_json(response).await;
    assert_eq!(goal["name"], "half marathon");
    assert_eq!(goal["status"], "in_progress");
    let goal_id = goal["goal_id"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/v1/goals/{}", goal_id),
            Some(&token),
            json!({
                "name": "Half Marathon",
                "description": "Done it",
                "goal_date": "2026-12-31",
                "completion_date": "2026-10-01",
                "status": "completed",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["completion_date"], "2026-10-01");

    let response = app
        .send(api_request("GET", "/api/v1/goals", Some(&token)))
        .await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .send(api_request("DELETE", &format!("/api/v1/goals/{}", goal_id), Some(&token)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(api_request("GET", "/api/v1/goals", Some(&token)))
        .await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_goal_validation_and_duplicates() {
    let app = TestApp::new();
    let token = app.access_token("dupgoal@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/goals",
            Some(&token),
            json!({ "name": "x", "description": "y", "goal_date": "31/12/2026" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "goal date must be in YYYY-MM-DD format"
    );

    app.send(json_request("POST", "/api/v1/goals", Some(&token), goal_body("Squat")))
        .await;
    let response = app
        .send(json_request("POST", "/api/v1/goals", Some(&token), goal_body("SQUAT")))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"],
        "Cannot have duplicate goal names"
    );
}

#[tokio::test]
async fn test_goals_are_scoped_to_their_owner() {
    let app = TestApp::new();
    let alice = app.access_token("alice@example.com").await;
    let bob = app.access_token("bob@example.com").await;

    let response = app
        .send(json_request("POST", "/api/v1/goals", Some(&alice), goal_body("Deadlift")))
        .await;
    let goal_id = body_json(response).await["goal_id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/v1/goals/{}", goal_id);

    let response = app
        .send(json_request("PUT", &uri, Some(&bob), {
            let mut body = goal_body("Stolen");
            body["status"] = json!("completed");
            body
        }))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(api_request("DELETE", &uri, Some(&bob))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(api_request("GET", "/api/v1/goals", Some(&bob)))
        .await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());

    let response = app
        .send(api_request("GET", "/api/v1/goals", Some(&alice)))
        .await;
    assert_eq!(body_json(response).await[0]["name"], "deadlift");
}

#[tokio::test]
async fn test_metrics_by_kind() {
    let app = TestApp::new();
    let token = app.access_token("metrics@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/metrics/body_weights",
            Some(&token),
            json!({ "measurement": 72.5 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let metric = body_json(response).await;
    assert_eq!(metric["measurement"], "72.5");
    assert_eq!(metric["metric_type"], "body_weights");
    let metric_id = metric["metric_id"].as_str().unwrap().to_string();

    app.send(json_request(
        "POST",
        "/api/v1/metrics/body_fat_percents",
        Some(&token),
        json!({ "measurement": "18.2" }),
    ))
    .await;

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/v1/metrics/body_weights/{}", metric_id),
            Some(&token),
            json!({ "measurement": "71.9" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(api_request("GET", "/api/v1/metrics", Some(&token)))
        .await;
    let overview = body_json(response).await;
    assert_eq!(overview["body_weights"][0]["measurement"], "71.9");
    assert_eq!(overview["body_fat_percents"].as_array().unwrap().len(), 1);
    assert!(overview["muscle_masses"].as_array().unwrap().is_empty());

    let response = app
        .send(api_request("DELETE", "/api/v1/metrics/body_fat_percents", Some(&token)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_metric_rejections() {
    let app = TestApp::new();
    let token = app.access_token("badmetric@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/metrics/heights",
            Some(&token),
            json!({ "measurement": 180 }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/metrics/muscle_masses",
            Some(&token),
            json!({ "measurement": "heavy" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "measurement must be a number");

    let response = app
        .send(api_request(
            "DELETE",
            "/api/v1/metrics/muscle_masses/not-a-uuid",
            Some(&token),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_workout_lifecycle() {
    let app = TestApp::new();
    let token = app.access_token("workouts@example.com").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/workouts",
            Some(&token),
            json!({ "title": "Leg day", "duration": "45", "planned_date": "2026-10-20" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let workout = body_json(response).await;
    assert_eq!(workout["duration"], 45);
    let workout_id = workout["id"].as_str().unwrap().to_string();

    let response = app
        .send(json_request(
            "PUT",
            &format!("/api/v1/workouts/{}", workout_id),
            Some(&token),
            json!({
                "title": "Leg day",
                "duration": 60,
                "planned_date": "2026-10-20",
                "date_completed": "2026-10-20",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["date_completed"], "2026-10-20");

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/workouts",
            Some(&token),
            json!({ "title": "Rest", "duration": "a while", "planned_date": "2026-10-21" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "duration must be a number");

    let response = app
        .send(api_request("DELETE", "/api/v1/workouts", Some(&token)))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(api_request("GET", "/api/v1/workouts", Some(&token)))
        .await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}
