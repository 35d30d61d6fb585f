use std::sync::Arc;

use tokio::sync::Notify;

use crate::config::AppConfig;
use crate::notify::NotificationFeed;
use crate::storage::{ReminderRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub reminders: Arc<ReminderRepository>,
    pub users: Arc<UserRepository>,
    pub feed: Arc<NotificationFeed>,
    /// Pokes the scheduler after a write so a nearer trigger is picked up
    /// before the next regular poll.
    pub scheduler_wakeup: Arc<Notify>,
}
