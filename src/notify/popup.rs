use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Preferences, Priority, Reminder};

use super::sound::{SoundCue, SoundResolver};
use super::{Delivery, NotificationChannel};

const FEED_CAPACITY: usize = 100;

/// One transient in-app popup. Carries the resolved sound cue so the client
/// showing it knows what to play.
#[derive(Debug, Clone, Serialize)]
pub struct PopupNotification {
    pub id: String,
    pub reminder_id: String,
    pub owner_id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub sound: SoundCue,
    pub raised_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Bounded in-memory feed the clients poll. Oldest entries fall off the
/// front once the feed is full.
#[derive(Default)]
pub struct NotificationFeed {
    entries: Mutex<VecDeque<PopupNotification>>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PopupNotification>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a popup unless an unacknowledged one for the same reminder is
    /// already showing.
    pub fn push(&self, popup: PopupNotification) {
        let mut entries = self.lock();
        if entries
            .iter()
            .any(|p| p.reminder_id == popup.reminder_id && !p.acknowledged)
        {
            return;
        }
        entries.push_back(popup);
        while entries.len() > FEED_CAPACITY {
            entries.pop_front();
        }
    }

    pub fn for_owner(&self, owner_id: &str) -> Vec<PopupNotification> {
        self.lock()
            .iter()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect()
    }

    pub fn unacknowledged_count(&self, owner_id: &str) -> usize {
        self.lock()
            .iter()
            .filter(|p| p.owner_id == owner_id && !p.acknowledged)
            .count()
    }

    pub fn acknowledge(&self, owner_id: &str, popup_id: &str) -> bool {
        let mut entries = self.lock();
        match entries
            .iter_mut()
            .find(|p| p.id == popup_id && p.owner_id == owner_id)
        {
            Some(popup) => {
                popup.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Drops everything an owner had pending, e.g. on logout.
    pub fn clear_owner(&self, owner_id: &str) {
        self.lock().retain(|p| p.owner_id != owner_id);
    }
}

/// In-app popup path. Owns its own rendering surface, so it is the one
/// channel that is always available.
pub struct PopupChannel {
    feed: Arc<NotificationFeed>,
    resolver: SoundResolver,
}

impl PopupChannel {
    pub fn new(feed: Arc<NotificationFeed>, resolver: SoundResolver) -> Self {
        Self { feed, resolver }
    }
}

#[async_trait]
impl NotificationChannel for PopupChannel {
    fn name(&self) -> &'static str {
        "popup"
    }

    async fn deliver(
        &self,
        reminder: &Reminder,
        _prefs: &Preferences,
    ) -> Result<Delivery, AppError> {
        self.feed.push(PopupNotification {
            id: Uuid::new_v4().to_string(),
            reminder_id: reminder.id.clone(),
            owner_id: reminder.owner_id.clone(),
            title: reminder.title.clone(),
            body: reminder.description.clone(),
            priority: reminder.priority,
            sound: self.resolver.resolve(reminder),
            raised_at: Utc::now(),
            acknowledged: false,
        });
        Ok(Delivery::Delivered)
    }
}
