//! PostgreSQL 仓库层测试
//!
//! 需要 FITHUB_TEST_DATABASE_URL 指向可写的测试库，未设置时跳过。

use chrono::{Duration, NaiveDate, Utc};
use fithub::{
    auth::jwt::hash_refresh_token,
    error::AppError,
    models::{
        goal::{GoalInput, STATUS_IN_PROGRESS},
        metric::MetricKind,
        user::{NewRefreshToken, NewUser, User},
    },
    repository::{GoalRepository, MetricRepository, PgStore, RefreshTokenRepository, UserRepository},
};
use serial_test::serial;

mod common;

fn new_user(email: &str) -> NewUser {
    NewUser {
        first_name: "test".to_string(),
        middle_name: None,
        last_name: "user".to_string(),
        email: email.to_string(),
        hashed_password: Some("$argon2id$placeholder".to_string()),
        profile_image: None,
    }
}

fn goal(name: &str) -> GoalInput {
    GoalInput {
        name: name.to_string(),
        description: "run further".to_string(),
        goal_date: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
        completion_date: None,
        notes: None,
        status: STATUS_IN_PROGRESS.to_string(),
    }
}

async fn create_user(store: &PgStore, email: &str) -> User {
    UserRepository::create(store, new_user(email))
        .await
        .expect("Failed to create test user")
}

#[tokio::test]
#[serial]
async fn test_user_create_and_find() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = PgStore::new(pool);

    let user = create_user(&store, "jane@example.com").await;

    let found = store
        .find_by_email("jane@example.com")
        .await
        .unwrap()
        .expect("User not found");
    assert_eq!(found.id, user.id);

    let by_id = store.find_by_id(user.id).await.unwrap().expect("User not found");
    assert_eq!(by_id.email, "jane@example.com");
}

#[tokio::test]
#[serial]
async fn test_duplicate_email_conflicts() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = PgStore::new(pool);

    create_user(&store, "dup@example.com").await;
    let err = UserRepository::create(&store, new_user("dup@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
#[serial]
async fn test_refresh_token_validity() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = PgStore::new(pool);
    let user = create_user(&store, "tokens@example.com").await;
    let now = Utc::now();

    let live = hash_refresh_token("live-token");
    let expired = hash_refresh_token("expired-token");
    store
        .store(NewRefreshToken {
            token_hash: live.clone(),
            user_id: user.id,
            expires_at: now + Duration::days(60),
        })
        .await
        .unwrap();
    store
        .store(NewRefreshToken {
            token_hash: expired.clone(),
            user_id: user.id,
            expires_at: now - Duration::seconds(1),
        })
        .await
        .unwrap();

    let record = store.find_valid(&live, now).await.unwrap().expect("token missing");
    assert_eq!(record.user_id, user.id);

    // 已过期
    assert!(store.find_valid(&expired, now).await.unwrap().is_none());

    // 撤销后不可用，重复撤销返回 false
    assert!(store.revoke(&live).await.unwrap());
    assert!(store.find_valid(&live, now).await.unwrap().is_none());
    assert!(!store.revoke(&live).await.unwrap());

    assert_eq!(store.delete_expired(now).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_goals_are_scoped_to_owner() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = PgStore::new(pool);
    let owner = create_user(&store, "owner@example.com").await;
    let other = create_user(&store, "other@example.com").await;

    let created = GoalRepository::create(&store, owner.id, goal("marathon"))
        .await
        .unwrap();

    // 其他用户无法更新或删除
    let err = GoalRepository::update(&store, other.id, created.id, goal("stolen"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = GoalRepository::delete(&store, other.id, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // 同一用户下目标名称唯一
    let err = GoalRepository::create(&store, owner.id, goal("marathon"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let goals = GoalRepository::list(&store, owner.id).await.unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].name, "marathon");
    assert!(GoalRepository::list(&store, other.id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_metric_measurement_round_trip() {
    let Some(pool) = common::setup_test_db().await else {
        return;
    };
    let store = PgStore::new(pool);
    let user = create_user(&store, "metrics@example.com").await;

    let metric = MetricRepository::create(&store, user.id, MetricKind::BodyWeights, "72.5")
        .await
        .unwrap();
    assert_eq!(metric.measurement, "72.5");

    let updated =
        MetricRepository::update(&store, user.id, MetricKind::BodyWeights, metric.id, "71.25")
            .await
            .unwrap();
    assert_eq!(updated.measurement, "71.25");

    // 不同类型的表互不影响
    assert!(MetricRepository::list(&store, user.id, MetricKind::MuscleMasses)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        MetricRepository::delete_all(&store, user.id, MetricKind::BodyWeights)
            .await
            .unwrap(),
        1
    );
}
