use axum::Json;
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::AppError;
use crate::models::*;
use crate::notify::PopupNotification;
use crate::state::AppState;

/// How far in the past a submitted trigger time may lie, so "just now"
/// submissions are not rejected.
const TRIGGER_GRACE_SECS: i64 = 60;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/reminders", get(list_reminders).post(create_reminder))
        .route("/reminders/stats", get(reminder_stats))
        .route("/reminders/bulk", post(bulk_action))
        .route("/reminders/{id}", patch(update_reminder).delete(delete_reminder))
        .route("/reminders/{id}/complete", post(complete_reminder))
        .route("/reminders/{id}/uncomplete", post(uncomplete_reminder))
        .route("/reminders/{id}/snooze", post(snooze_reminder))
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/ack", post(acknowledge_notification))
        .with_state(state)
}

/// Authenticated caller, resolved from the bearer token. Resolving also
/// slides the session expiry forward.
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;
        let user = state
            .users
            .validate_session(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Session expired or unknown".to_string()))?;
        Ok(AuthSession {
            user,
            token: token.to_string(),
        })
    }
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.reminders.ping().await?;
    Ok(StatusCode::OK)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please fill in all fields".to_string(),
        ));
    }
    if req.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    if !auth::is_valid_email(req.email.trim()) {
        return Err(AppError::BadRequest(
            "Please enter a valid email address".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&req.password)?;
    let user = state
        .users
        .create_user(
            req.username.trim().to_string(),
            req.email.trim().to_string(),
            password_hash,
        )
        .await?;
    let session = state.users.create_session(&user.id).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: PublicUser::from(&user),
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Please fill in all fields".to_string(),
        ));
    }

    let user = state
        .users
        .find_by_username(req.username.trim())
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid username or password".to_string()))?;
    if !auth::verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    let session = state.users.create_session(&user.id).await?;
    Ok(Json(AuthResponse {
        token: session.token,
        user: PublicUser::from(&user),
    }))
}

/// Ends the session and clears the user's pending popups.
async fn logout(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<StatusCode, AppError> {
    state.users.remove_session(&session.token).await?;
    state.feed.clear_owner(&session.user.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn me(session: AuthSession) -> Json<PublicUser> {
    Json(PublicUser::from(&session.user))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ReminderFilter {
    #[default]
    All,
    Today,
    Upcoming,
    Completed,
}

#[derive(Deserialize)]
struct ReminderQueryParams {
    #[serde(default)]
    filter: ReminderFilter,
    category: Option<Category>,
    q: Option<String>,
}

async fn list_reminders(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<ReminderQueryParams>,
) -> Result<Json<Vec<Reminder>>, AppError> {
    let now = Utc::now();
    let mut reminders = state.reminders.load_for_owner(&session.user.id).await?;

    reminders.retain(|r| match params.filter {
        ReminderFilter::All => true,
        ReminderFilter::Today => {
            r.trigger_time.date_naive() == now.date_naive()
                && r.status != ReminderStatus::Completed
        }
        ReminderFilter::Upcoming => r.is_pending() && r.trigger_time > now,
        ReminderFilter::Completed => r.status == ReminderStatus::Completed,
    });
    if let Some(category) = params.category {
        reminders.retain(|r| r.category == category);
    }
    if let Some(q) = params.q.as_deref() {
        let q = q.to_lowercase();
        reminders.retain(|r| {
            r.title.to_lowercase().contains(&q) || r.description.to_lowercase().contains(&q)
        });
    }
    reminders.sort_by_key(|r| r.trigger_time);

    Ok(Json(reminders))
}

fn check_trigger_time(trigger_time: chrono::DateTime<Utc>) -> Result<(), AppError> {
    if trigger_time < Utc::now() - Duration::seconds(TRIGGER_GRACE_SECS) {
        return Err(AppError::BadRequest(
            "Please select a future date and time".to_string(),
        ));
    }
    Ok(())
}

async fn create_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<NewReminderRequest>,
) -> Result<Json<Reminder>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Please fill in required fields".to_string(),
        ));
    }
    check_trigger_time(req.trigger_time)?;

    let reminder = state
        .reminders
        .insert(Reminder::new(session.user.id.clone(), req))
        .await?;
    state.scheduler_wakeup.notify_one();
    Ok(Json(reminder))
}

async fn update_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<UpdateReminderRequest>,
) -> Result<Json<Reminder>, AppError> {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Please fill in required fields".to_string(),
            ));
        }
    }
    if let Some(trigger_time) = req.trigger_time {
        check_trigger_time(trigger_time)?;
    }

    let reminder = state
        .reminders
        .update(&session.user.id, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    state.scheduler_wakeup.notify_one();
    Ok(Json(reminder))
}

async fn delete_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let ok = state.reminders.delete(&session.user.id, &id).await?;
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn complete_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, AppError> {
    let now = Utc::now();
    let reminder = state
        .reminders
        .modify(&session.user.id, &id, |r| r.complete(now))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(reminder))
}

async fn uncomplete_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, AppError> {
    let now = Utc::now();
    let reminder = state
        .reminders
        .modify(&session.user.id, &id, |r| r.uncomplete(now))
        .await?
        .ok_or(AppError::NotFound)?;
    state.scheduler_wakeup.notify_one();
    Ok(Json(reminder))
}

async fn snooze_reminder(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
    Json(req): Json<SnoozeRequest>,
) -> Result<Json<Reminder>, AppError> {
    let minutes = req.minutes.unwrap_or(state.config.snooze_minutes);
    if minutes <= 0 {
        return Err(AppError::BadRequest(
            "Snooze minutes must be positive".to_string(),
        ));
    }

    let existing = state
        .reminders
        .find(&session.user.id, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    if existing.status == ReminderStatus::Completed {
        return Err(AppError::BadRequest(
            "Completed reminders cannot be snoozed".to_string(),
        ));
    }

    let now = Utc::now();
    let reminder = state
        .reminders
        .modify(&session.user.id, &id, |r| r.snooze(minutes, now))
        .await?
        .ok_or(AppError::NotFound)?;
    state.scheduler_wakeup.notify_one();
    Ok(Json(reminder))
}

#[derive(Debug, Serialize)]
struct BulkResult {
    affected: usize,
}

async fn bulk_action(
    State(state): State<AppState>,
    session: AuthSession,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkResult>, AppError> {
    if req.ids.is_empty() {
        return Err(AppError::BadRequest("No reminders selected".to_string()));
    }
    let affected = state
        .reminders
        .bulk(&session.user.id, req.action, &req.ids)
        .await?;
    Ok(Json(BulkResult { affected }))
}

#[derive(Debug, Serialize)]
struct ReminderStats {
    total: usize,
    active_today: usize,
    completed: usize,
    completion_rate: u32,
}

async fn reminder_stats(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<ReminderStats>, AppError> {
    let now = Utc::now();
    let reminders = state.reminders.load_for_owner(&session.user.id).await?;

    let total = reminders.len();
    let completed = reminders
        .iter()
        .filter(|r| r.status == ReminderStatus::Completed)
        .count();
    let active_today = reminders
        .iter()
        .filter(|r| {
            r.trigger_time.date_naive() == now.date_naive()
                && r.status != ReminderStatus::Completed
        })
        .count();
    let completion_rate = if total > 0 {
        (completed * 100 / total) as u32
    } else {
        0
    };

    Ok(Json(ReminderStats {
        total,
        active_today,
        completed,
        completion_rate,
    }))
}

async fn list_notifications(
    State(state): State<AppState>,
    session: AuthSession,
) -> Json<Vec<PopupNotification>> {
    Json(state.feed.for_owner(&session.user.id))
}

async fn acknowledge_notification(
    State(state): State<AppState>,
    session: AuthSession,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.feed.acknowledge(&session.user.id, &id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
