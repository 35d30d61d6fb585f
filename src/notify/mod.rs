pub mod popup;
pub mod sound;
pub mod system;

pub use popup::{NotificationFeed, PopupChannel, PopupNotification};
pub use sound::{AudioChannel, AudioSink, NullSink, SoundCue, SoundResolver};
pub use system::SystemChannel;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{Preferences, Reminder};

/// One best-effort delivery channel. A channel may decline (permission,
/// owner preference) or fail; neither stops the other channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(
        &self,
        reminder: &Reminder,
        prefs: &Preferences,
    ) -> Result<Delivery, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Skipped(&'static str),
}
