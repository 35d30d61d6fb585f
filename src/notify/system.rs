use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::AppError;
use crate::models::{Preferences, Reminder};
use crate::push::{PermissionState, PushClient, PushMessage};

use super::{Delivery, NotificationChannel};

/// System-level notification path. Permission is requested from the gateway
/// once and cached; anything short of `Granted` silently hands the reminder
/// to the remaining channels.
pub struct SystemChannel {
    push: Arc<dyn PushClient>,
    permission: OnceCell<PermissionState>,
}

impl SystemChannel {
    pub fn new(push: Arc<dyn PushClient>) -> Self {
        Self {
            push,
            permission: OnceCell::new(),
        }
    }

    async fn permission(&self) -> PermissionState {
        *self
            .permission
            .get_or_init(|| async { self.push.request_permission().await })
            .await
    }
}

#[async_trait]
impl NotificationChannel for SystemChannel {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn deliver(
        &self,
        reminder: &Reminder,
        prefs: &Preferences,
    ) -> Result<Delivery, AppError> {
        if !prefs.notifications {
            return Ok(Delivery::Skipped("notifications disabled by owner"));
        }
        if self.permission().await != PermissionState::Granted {
            debug!("system channel without permission, skipping");
            return Ok(Delivery::Skipped("permission not granted"));
        }

        let body = if reminder.description.is_empty() {
            "Reminder time!".to_string()
        } else {
            reminder.description.clone()
        };
        let message = PushMessage {
            reminder_id: reminder.id.clone(),
            title: reminder.title.clone(),
            body,
            trigger_time: reminder.trigger_time,
        };
        self.push.send_push(&message).await?;
        Ok(Delivery::Delivered)
    }
}
