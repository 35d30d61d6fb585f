use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;

use reminder_backend::api::router;
use reminder_backend::config::AppConfig;
use reminder_backend::notify::{NotificationFeed, PopupNotification, SoundCue};
use reminder_backend::state::AppState;
use reminder_backend::storage::{MemoryStore, ReminderRepository, UserRepository};

fn test_state() -> AppState {
    let store = Arc::new(MemoryStore::new());
    AppState {
        config: AppConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: "unused".into(),
            poll_interval_secs: 30,
            snooze_minutes: 10,
            sound_dir: None,
        },
        reminders: Arc::new(ReminderRepository::new(store.clone())),
        users: Arc::new(UserRepository::new(store)),
        feed: Arc::new(NotificationFeed::new()),
        scheduler_wakeup: Arc::new(Notify::new()),
    }
}

fn test_app() -> (Router, AppState) {
    let state = test_state();
    (router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn in_one_hour() -> String {
    (Utc::now() + Duration::hours(1)).to_rfc3339()
}

async fn create_reminder(app: &Router, token: &str, title: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/reminders",
        Some(token),
        Some(json!({"title": title, "trigger_time": in_one_hour()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_login_me_flow() {
    let (app, _) = test_app();
    let token = register(&app, "ren").await;

    let (status, me) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ren");
    assert_eq!(me["preferences"]["notifications"], true);

    let (status, login) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "ren", "password": "hunter22"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(login["token"].as_str().is_some());
}

#[tokio::test]
async fn test_register_validation() {
    let (app, _) = test_app();

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "a", "email": "a@example.com", "password": "short"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password must be at least 6 characters");

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "a", "email": "not-an-email", "password": "longenough"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please enter a valid email address");

    register(&app, "taken").await;
    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "taken", "email": "other@example.com", "password": "longenough"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Username already exists");
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (app, _) = test_app();
    register(&app, "mika").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"username": "mika", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_reminders_require_session() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/reminders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/reminders", Some("bogus-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_rejects_past_trigger_time() {
    let (app, _) = test_app();
    let token = register(&app, "dana").await;

    let past = (Utc::now() - Duration::minutes(5)).to_rfc3339();
    let (status, body) = send(
        &app,
        "POST",
        "/reminders",
        Some(&token),
        Some(json!({"title": "Too late", "trigger_time": past})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please select a future date and time");
}

#[tokio::test]
async fn test_each_owner_sees_only_their_reminders() {
    let (app, _) = test_app();
    let token_a = register(&app, "owner-a").await;
    let token_b = register(&app, "owner-b").await;

    for i in 0..3 {
        create_reminder(&app, &token_a, &format!("a{i}")).await;
        create_reminder(&app, &token_b, &format!("b{i}")).await;
    }

    let (_, list_a) = send(&app, "GET", "/reminders", Some(&token_a), None).await;
    let (_, list_b) = send(&app, "GET", "/reminders", Some(&token_b), None).await;
    assert_eq!(list_a.as_array().unwrap().len(), 3);
    assert_eq!(list_b.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_filter_and_search() {
    let (app, _) = test_app();
    let token = register(&app, "finder").await;

    create_reminder(&app, &token, "Buy milk").await;
    let done = create_reminder(&app, &token, "Pay rent").await;
    let done_id = done["id"].as_str().unwrap();
    send(
        &app,
        "POST",
        &format!("/reminders/{done_id}/complete"),
        Some(&token),
        None,
    )
    .await;

    let (_, completed) = send(
        &app,
        "GET",
        "/reminders?filter=completed",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
    assert_eq!(completed[0]["title"], "Pay rent");

    let (_, found) = send(&app, "GET", "/reminders?q=milk", Some(&token), None).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["title"], "Buy milk");
}

#[tokio::test]
async fn test_complete_and_stats() {
    let (app, _) = test_app();
    let token = register(&app, "stats").await;

    let first = create_reminder(&app, &token, "one").await;
    create_reminder(&app, &token, "two").await;

    let id = first["id"].as_str().unwrap();
    let (status, completed) = send(
        &app,
        "POST",
        &format!("/reminders/{id}/complete"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(completed["status"], "completed");
    assert!(completed["completed_at"].as_str().is_some());

    let (status, stats) = send(&app, "GET", "/reminders/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["completion_rate"], 50);
}

#[tokio::test]
async fn test_snooze_defaults_to_ten_minutes() {
    let (app, _) = test_app();
    let token = register(&app, "sleepy").await;
    let reminder = create_reminder(&app, &token, "nap").await;
    let id = reminder["id"].as_str().unwrap();

    let before = Utc::now();
    let (status, snoozed) = send(
        &app,
        "POST",
        &format!("/reminders/{id}/snooze"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snoozed["status"], "snoozed");

    let trigger: chrono::DateTime<Utc> = snoozed["trigger_time"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(trigger > before + Duration::minutes(9));
    assert!(trigger < before + Duration::minutes(11));
}

#[tokio::test]
async fn test_update_rearms_reminder() {
    let (app, _) = test_app();
    let token = register(&app, "editor").await;
    let reminder = create_reminder(&app, &token, "draft").await;
    let id = reminder["id"].as_str().unwrap();

    send(
        &app,
        "POST",
        &format!("/reminders/{id}/complete"),
        Some(&token),
        None,
    )
    .await;

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/reminders/{id}"),
        Some(&token),
        Some(json!({"title": "final", "trigger_time": in_one_hour()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "final");
    assert_eq!(updated["status"], "scheduled");
    assert!(updated["completed_at"].is_null());
}

#[tokio::test]
async fn test_delete_is_scoped_to_owner() {
    let (app, _) = test_app();
    let token_a = register(&app, "del-a").await;
    let token_b = register(&app, "del-b").await;
    let reminder = create_reminder(&app, &token_a, "mine").await;
    let id = reminder["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/reminders/{id}"),
        Some(&token_b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/reminders/{id}"),
        Some(&token_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_bulk_complete() {
    let (app, _) = test_app();
    let token = register(&app, "bulk").await;
    let a = create_reminder(&app, &token, "one").await;
    let b = create_reminder(&app, &token, "two").await;

    let (status, result) = send(
        &app,
        "POST",
        "/reminders/bulk",
        Some(&token),
        Some(json!({
            "action": "complete",
            "ids": [a["id"], b["id"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["affected"], 2);

    let (_, stats) = send(&app, "GET", "/reminders/stats", Some(&token), None).await;
    assert_eq!(stats["completed"], 2);
}

#[tokio::test]
async fn test_notifications_feed_and_ack() {
    let (app, state) = test_app();
    let token = register(&app, "popup-user").await;

    let (_, me) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    let owner_id = me["id"].as_str().unwrap().to_string();

    state.feed.push(PopupNotification {
        id: "popup-1".to_string(),
        reminder_id: "r-1".to_string(),
        owner_id,
        title: "Stand up".to_string(),
        body: String::new(),
        priority: Default::default(),
        sound: SoundCue::default_tone(),
        raised_at: Utc::now(),
        acknowledged: false,
    });

    let (status, feed) = send(&app, "GET", "/notifications", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["acknowledged"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/notifications/popup-1/ack",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, feed) = send(&app, "GET", "/notifications", Some(&token), None).await;
    assert_eq!(feed[0]["acknowledged"], true);
}

#[tokio::test]
async fn test_logout_invalidates_session_and_clears_popups() {
    let (app, state) = test_app();
    let token = register(&app, "bye").await;
    let (_, me) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    let owner_id = me["id"].as_str().unwrap().to_string();

    state.feed.push(PopupNotification {
        id: "popup-9".to_string(),
        reminder_id: "r-9".to_string(),
        owner_id: owner_id.clone(),
        title: "Lingering".to_string(),
        body: String::new(),
        priority: Default::default(),
        sound: SoundCue::default_tone(),
        raised_at: Utc::now(),
        acknowledged: false,
    });

    let (status, _) = send(&app, "POST", "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.feed.for_owner(&owner_id).is_empty());
}
