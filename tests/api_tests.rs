// tests/api_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use backend::cache::Cache;
use backend::config::Config;
use backend::error::AppError;
use backend::routes;
use backend::services::availability::Interval;
use backend::services::calendar::{CalendarApi, CreatedEvent, EventRequest};
use backend::state::AppState;
use backend::utils::jwt::sign_identity_token;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;

const TEST_SECRET: &str = "test_secret_for_integration_tests";

/// Calendar double: fixed busy intervals, always-succeeding event insert.
#[derive(Default)]
struct StubCalendar {
    busy: Vec<Interval>,
}

#[async_trait]
impl CalendarApi for StubCalendar {
    async fn free_busy(
        &self,
        _access_token: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Interval>, AppError> {
        Ok(self.busy.clone())
    }

    async fn create_event(
        &self,
        _access_token: &str,
        _event: &EventRequest,
    ) -> Result<CreatedEvent, AppError> {
        Ok(CreatedEvent {
            id: "evt-stub".to_string(),
            html_link: Some("https://calendar.example/evt-stub".to_string()),
        })
    }
}

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        redis_url: "redis://localhost:6379".to_string(),
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
        calendar_api_base: "http://127.0.0.1:0".to_string(),
    };

    let state = AppState {
        pool,
        config,
        cache: Cache::disabled(),
        calendar: Arc::new(StubCalendar::default()),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    address
}

fn unique_uid(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().to_string()[..8])
}

fn token_for(uid: &str) -> String {
    sign_identity_token(uid, &format!("{}@example.com", uid), TEST_SECRET, 600).unwrap()
}

async fn register(
    client: &reqwest::Client,
    address: &str,
    uid: &str,
    body: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/api/auth/register", address))
        .bearer_auth(token_for(uid))
        .json(&body)
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("reg");

    let response = register(
        &client,
        &address,
        &uid,
        serde_json::json!({
            "name": "  Ada Lovelace ",
            "skills_offered": ["Rust", " SQL "],
            "skills_wanted": ["Go"],
            "availability": { "days": ["Monday"], "times": ["10:00-11:00"] }
        }),
    )
    .await;

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    let user = &body["data"]["user"];
    assert_eq!(user["uid"], uid.as_str());
    assert_eq!(user["name"], "Ada Lovelace");
    assert_eq!(user["role"], "student");
    assert_eq!(user["skills_offered"], serde_json::json!(["Rust", "SQL"]));
    assert_eq!(user["badge_score"], 0.0);
}

#[tokio::test]
async fn register_requires_identity_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // No token at all.
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "name": "No Token" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
    // Even middleware-level rejections carry the standard error body.
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    // A token signed with the wrong secret.
    let forged =
        sign_identity_token("intruder", "intruder@example.com", "wrong_secret", 600).unwrap();
    let response = client
        .post(format!("{}/api/auth/register", address))
        .bearer_auth(forged)
        .json(&serde_json::json!({ "name": "No Token" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("val");

    // Empty name is rejected before any write.
    let response = register(&client, &address, &uid, serde_json::json!({ "name": "" })).await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    // Admin cannot be self-assigned.
    let response = register(
        &client,
        &address,
        &uid,
        serde_json::json!({ "name": "Eve", "role": "admin" }),
    )
    .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("dup");

    let first = register(&client, &address, &uid, serde_json::json!({ "name": "A" })).await;
    assert_eq!(first.status().as_u16(), 201);

    let second = register(&client, &address, &uid, serde_json::json!({ "name": "A" })).await;
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_signals_needs_registration_then_returns_user() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("login");

    let response = client
        .post(format!("{}/api/auth/login", address))
        .bearer_auth(token_for(&uid))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["needsRegistration"], true);
    assert_eq!(body["data"]["uid"], uid.as_str());

    register(&client, &address, &uid, serde_json::json!({ "name": "Lin" })).await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .bearer_auth(token_for(&uid))
        .send()
        .await
        .expect("Failed to execute request");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["uid"], uid.as_str());
    assert_eq!(body["data"]["user"]["name"], "Lin");
}

#[tokio::test]
async fn profile_me_and_public_profile() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("prof");

    register(
        &client,
        &address,
        &uid,
        serde_json::json!({ "name": "Maya", "role": "mentor", "skills_offered": ["Piano"] }),
    )
    .await;

    let me: serde_json::Value = client
        .get(format!("{}/api/profile/me", address))
        .bearer_auth(token_for(&uid))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["success"], true);
    assert_eq!(me["data"]["user"]["email"], format!("{}@example.com", uid));
    assert_eq!(me["data"]["user"]["calendar_synced"], false);

    // Public subset: no email, no wanted skills.
    let public: serde_json::Value = client
        .get(format!("{}/api/profile/{}", address, uid))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(public["data"]["user"]["name"], "Maya");
    assert!(public["data"]["user"].get("email").is_none());
    assert!(public["data"]["user"].get("skills_wanted").is_none());
}

#[tokio::test]
async fn profile_update_adjusts_skill_popularity() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let uid = unique_uid("pop");
    let skill = format!("Juggling-{}", &uuid::Uuid::new_v4().to_string()[..8]);

    register(
        &client,
        &address,
        &uid,
        serde_json::json!({ "name": "Pat", "skills_offered": [skill] }),
    )
    .await;

    let count: i64 =
        sqlx::query_scalar("SELECT count FROM skill_popularity WHERE skill_key = $1")
            .bind(skill.to_lowercase())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);

    // Removing the skill decrements its counter.
    let response = client
        .post(format!("{}/api/profile/update", address))
        .bearer_auth(token_for(&uid))
        .json(&serde_json::json!({ "skills_offered": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let count: i64 =
        sqlx::query_scalar("SELECT count FROM skill_popularity WHERE skill_key = $1")
            .bind(skill.to_lowercase())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn empty_profile_update_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("upd");

    register(&client, &address, &uid, serde_json::json!({ "name": "Kim" })).await;

    let response = client
        .post(format!("{}/api/profile/update", address))
        .bearer_auth(token_for(&uid))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn delete_profile_enforces_ownership() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let user_a = unique_uid("del_a");
    let user_b = unique_uid("del_b");

    register(&client, &address, &user_a, serde_json::json!({ "name": "A" })).await;
    register(&client, &address, &user_b, serde_json::json!({ "name": "B" })).await;

    // A may not delete B.
    let response = client
        .delete(format!("{}/api/profile/{}", address, user_b))
        .bearer_auth(token_for(&user_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // A deletes A; the account is gone on next login.
    let response = client
        .delete(format!("{}/api/profile/{}", address, user_a))
        .bearer_auth(token_for(&user_a))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .bearer_auth(token_for(&user_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["needsRegistration"], true);
}

#[tokio::test]
async fn admin_stats_require_the_admin_role() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .unwrap();

    let uid = unique_uid("admin");
    register(&client, &address, &uid, serde_json::json!({ "name": "Ops" })).await;

    let response = client
        .get(format!("{}/api/profile/admin/stats", address))
        .bearer_auth(token_for(&uid))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Admin is never self-assignable; promote directly.
    sqlx::query("UPDATE users SET role = 'admin' WHERE uid = $1")
        .bind(&uid)
        .execute(&pool)
        .await
        .unwrap();

    let body: serde_json::Value = client
        .get(format!("{}/api/profile/admin/stats", address))
        .bearer_auth(token_for(&uid))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    let stats = &body["data"]["stats"];
    assert!(stats["total_users"].as_i64().unwrap() >= 1);
    assert!(stats["users_by_role"]["admin"].as_i64().unwrap() >= 1);
    assert!(stats["popular_skills"].is_array());
    assert!(stats["total_unique_skills"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn badge_awards_accumulate() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let uid = unique_uid("badge");

    register(&client, &address, &uid, serde_json::json!({ "name": "B" })).await;

    // Default award is a single badge.
    let body: serde_json::Value = client
        .post(format!("{}/api/profile/badges", address))
        .bearer_auth(token_for(&uid))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["new_badge_count"], 1);

    let body: serde_json::Value = client
        .post(format!("{}/api/profile/badges", address))
        .bearer_auth(token_for(&uid))
        .json(&serde_json::json!({ "increment": 3 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["new_badge_count"], 4);

    // Negative awards are rejected.
    let response = client
        .post(format!("{}/api/profile/badges", address))
        .bearer_auth(token_for(&uid))
        .json(&serde_json::json!({ "increment": -2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Badge count is visible on the profile; the badge score is untouched.
    let body: serde_json::Value = client
        .get(format!("{}/api/profile/{}", address, uid))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["user"]["badge_count"], 4);
    assert_eq!(body["data"]["user"]["badge_score"], 0.0);
}

#[tokio::test]
async fn rate_session_boundaries_do_not_mutate_mentor() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let rater = unique_uid("rater");
    let mentor = unique_uid("mentor");

    register(&client, &address, &rater, serde_json::json!({ "name": "R" })).await;
    register(
        &client,
        &address,
        &mentor,
        serde_json::json!({ "name": "M", "role": "mentor" }),
    )
    .await;

    for rating in [0, 6] {
        let response = client
            .post(format!("{}/api/profile/rate-session", address))
            .bearer_auth(token_for(&rater))
            .json(&serde_json::json!({
                "sessionId": uuid::Uuid::new_v4(),
                "mentorUid": mentor,
                "rating": rating,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
    }

    let body: serde_json::Value = client
        .get(format!("{}/api/profile/{}", address, mentor))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["user"]["badge_count"], 0);
    assert_eq!(body["data"]["user"]["badge_score"], 0.0);
}

#[tokio::test]
async fn ratings_keep_running_average_invariant() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let rater = unique_uid("avg_r");
    let mentor = unique_uid("avg_m");

    register(&client, &address, &rater, serde_json::json!({ "name": "R" })).await;
    register(
        &client,
        &address,
        &mentor,
        serde_json::json!({ "name": "M", "role": "mentor" }),
    )
    .await;

    let mut last = serde_json::Value::Null;
    for rating in [5, 4, 4] {
        let response = client
            .post(format!("{}/api/profile/rate-session", address))
            .bearer_auth(token_for(&rater))
            .json(&serde_json::json!({
                "sessionId": uuid::Uuid::new_v4(),
                "mentorUid": mentor,
                "rating": rating,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        last = response.json().await.unwrap();
    }

    // round(13 / 3, 2)
    assert_eq!(last["data"]["reputation"]["badge_count"], 3);
    assert_eq!(last["data"]["reputation"]["total_badge_points"], 13);
    assert_eq!(last["data"]["reputation"]["badge_score"], 4.33);
}
