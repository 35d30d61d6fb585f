use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::AppError;
use crate::models::{
    BulkAction, Preferences, Reminder, ReminderStatus, Session, UpdateReminderRequest, User,
};

use super::{KeyValueStore, StorageError};

const REMINDERS_KEY: &str = "reminders";
const USERS_KEY: &str = "users";
const SESSIONS_KEY: &str = "sessions";

/// Reminder records for every owner live in one persisted collection.
/// Saves are whole-collection rewrites, so every mutation goes through the
/// repository's write lock: one writer at a time, readers see the last
/// completed write.
pub struct ReminderRepository {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl ReminderRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<Vec<Reminder>, StorageError> {
        match self.kv.get(REMINDERS_KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(list) => Ok(list),
                Err(e) => {
                    warn!("reminders collection unreadable, starting empty: {}", e);
                    Ok(Vec::new())
                }
            },
        }
    }

    fn write_all(&self, items: &[Reminder]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.kv.set(REMINDERS_KEY, &raw)
    }

    pub async fn ping(&self) -> Result<(), StorageError> {
        self.kv.get(REMINDERS_KEY).map(|_| ())
    }

    pub async fn load_for_owner(&self, owner_id: &str) -> Result<Vec<Reminder>, StorageError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.owner_id == owner_id)
            .collect())
    }

    /// Replaces one owner's records, leaving every other owner's untouched.
    pub async fn save_for_owner(
        &self,
        owner_id: &str,
        items: Vec<Reminder>,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all: Vec<Reminder> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.owner_id != owner_id)
            .collect();
        all.extend(items);
        self.write_all(&all)
    }

    pub async fn insert(&self, reminder: Reminder) -> Result<Reminder, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        all.push(reminder.clone());
        self.write_all(&all)?;
        Ok(reminder)
    }

    pub async fn find(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<Reminder>, StorageError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|r| r.id == id && r.owner_id == owner_id))
    }

    /// Load-mutate-save for a single record, under the write lock.
    pub async fn modify<F>(
        &self,
        owner_id: &str,
        id: &str,
        apply: F,
    ) -> Result<Option<Reminder>, StorageError>
    where
        F: FnOnce(&mut Reminder),
    {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        let Some(target) = all
            .iter_mut()
            .find(|r| r.id == id && r.owner_id == owner_id)
        else {
            return Ok(None);
        };
        apply(target);
        let updated = target.clone();
        self.write_all(&all)?;
        Ok(Some(updated))
    }

    /// Applies an edit and re-arms the record: edited reminders go back to
    /// `Scheduled` just like newly created ones.
    pub async fn update(
        &self,
        owner_id: &str,
        id: &str,
        req: UpdateReminderRequest,
    ) -> Result<Option<Reminder>, StorageError> {
        self.modify(owner_id, id, |r| {
            if let Some(title) = req.title {
                r.title = title;
            }
            if let Some(description) = req.description {
                r.description = description;
            }
            if let Some(trigger_time) = req.trigger_time {
                r.trigger_time = trigger_time;
            }
            if let Some(priority) = req.priority {
                r.priority = priority;
            }
            if let Some(category) = req.category {
                r.category = category;
            }
            if let Some(sound_clip) = req.sound_clip {
                r.sound_clip = Some(sound_clip);
            }
            if let Some(repeat) = req.repeat {
                r.repeat = Some(repeat);
            }
            r.status = ReminderStatus::Scheduled;
            r.completed_at = None;
        })
        .await
    }

    pub async fn delete(&self, owner_id: &str, id: &str) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|r| !(r.id == id && r.owner_id == owner_id));
        if all.len() == before {
            return Ok(false);
        }
        self.write_all(&all)?;
        Ok(true)
    }

    pub async fn bulk(
        &self,
        owner_id: &str,
        action: BulkAction,
        ids: &[String],
    ) -> Result<usize, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        let now = Utc::now();
        let mut affected = 0;
        match action {
            BulkAction::Complete => {
                for r in all.iter_mut() {
                    if r.owner_id == owner_id
                        && ids.iter().any(|id| *id == r.id)
                        && r.status != ReminderStatus::Completed
                    {
                        r.complete(now);
                        affected += 1;
                    }
                }
            }
            BulkAction::Delete => {
                let before = all.len();
                all.retain(|r| !(r.owner_id == owner_id && ids.iter().any(|id| *id == r.id)));
                affected = before - all.len();
            }
        }
        if affected > 0 {
            self.write_all(&all)?;
        }
        Ok(affected)
    }

    pub async fn due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, StorageError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.is_due(now))
            .collect())
    }

    pub async fn earliest_pending_trigger(
        &self,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self
            .read_all()?
            .iter()
            .filter(|r| r.is_pending())
            .map(|r| r.trigger_time)
            .min())
    }

    /// Transitions dispatched reminders, re-checking that each is still
    /// pending and due so a record completed mid-dispatch stays untouched.
    /// Returns (fired, rescheduled-repeats).
    pub async fn mark_fired(
        &self,
        ids: &[String],
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all()?;
        let mut fired = 0;
        let mut rescheduled = 0;
        for r in all.iter_mut() {
            if ids.iter().any(|id| *id == r.id) && r.is_due(now) {
                let repeating = r.repeat.is_some();
                r.fire(now);
                if repeating {
                    rescheduled += 1;
                } else {
                    fired += 1;
                }
            }
        }
        if fired + rescheduled > 0 {
            self.write_all(&all)?;
        }
        Ok((fired, rescheduled))
    }
}

/// Accounts and bearer sessions, persisted the same way.
pub struct UserRepository {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl UserRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    fn read_users(&self) -> Result<Vec<User>, StorageError> {
        match self.kv.get(USERS_KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(list) => Ok(list),
                Err(e) => {
                    warn!("users collection unreadable, starting empty: {}", e);
                    Ok(Vec::new())
                }
            },
        }
    }

    fn write_users(&self, users: &[User]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(users)?;
        self.kv.set(USERS_KEY, &raw)
    }

    fn read_sessions(&self) -> Result<Vec<Session>, StorageError> {
        match self.kv.get(SESSIONS_KEY)? {
            None => Ok(Vec::new()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(list) => Ok(list),
                Err(e) => {
                    warn!("sessions collection unreadable, starting empty: {}", e);
                    Ok(Vec::new())
                }
            },
        }
    }

    fn write_sessions(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(sessions)?;
        self.kv.set(SESSIONS_KEY, &raw)
    }

    pub async fn create_user(
        &self,
        username: String,
        email: String,
        password_hash: String,
    ) -> Result<User, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut users = self.read_users()?;
        if users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if users.iter().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }
        let user = User::new(username, email, password_hash);
        users.push(user.clone());
        self.write_users(&users)?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .read_users()?
            .into_iter()
            .find(|u| u.username == username))
    }

    pub async fn preferences_by_id(
        &self,
    ) -> Result<HashMap<String, Preferences>, StorageError> {
        Ok(self
            .read_users()?
            .into_iter()
            .map(|u| (u.id, u.preferences))
            .collect())
    }

    pub async fn create_session(&self, user_id: &str) -> Result<Session, StorageError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();
        let mut sessions = self.read_sessions()?;
        sessions.retain(|s| !s.is_expired(now));
        let session = Session::new(user_id.to_string());
        sessions.push(session.clone());
        self.write_sessions(&sessions)?;
        Ok(session)
    }

    /// Resolves a bearer token to its user. Valid sessions slide: the
    /// expiry is pushed out on every hit.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, StorageError> {
        let now = Utc::now();
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.read_sessions()?;
        let Some(idx) = sessions.iter().position(|s| s.token == token) else {
            return Ok(None);
        };
        if sessions[idx].is_expired(now) {
            sessions.remove(idx);
            self.write_sessions(&sessions)?;
            return Ok(None);
        }
        sessions[idx].touch(now);
        let user_id = sessions[idx].user_id.clone();
        self.write_sessions(&sessions)?;
        Ok(self.read_users()?.into_iter().find(|u| u.id == user_id))
    }

    pub async fn remove_session(&self, token: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut sessions = self.read_sessions()?;
        let before = sessions.len();
        sessions.retain(|s| s.token != token);
        if sessions.len() != before {
            self.write_sessions(&sessions)?;
        }
        Ok(())
    }
}
