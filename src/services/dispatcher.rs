use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::{Preferences, Reminder};
use crate::notify::{Delivery, NotificationChannel};

/// 通知ディスパッチャー
/// 期限切れリマインダーを各チャンネルに順番に配信する
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Delivered,
    Skipped(&'static str),
    Failed(String),
}

#[derive(Debug)]
pub struct DispatchReport {
    pub reminder_id: String,
    /// Channel name -> what happened there.
    pub outcomes: Vec<(&'static str, ChannelOutcome)>,
    /// True when the reminder was no longer pending and nothing was shown.
    pub suppressed: bool,
}

impl DispatchReport {
    pub fn delivered_on(&self, channel: &str) -> bool {
        self.outcomes
            .iter()
            .any(|(name, outcome)| *name == channel && *outcome == ChannelOutcome::Delivered)
    }

    pub fn delivered_anywhere(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, outcome)| *outcome == ChannelOutcome::Delivered)
    }
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// 全チャンネルを試す。失敗してもログのみで継続
    /// Re-checks the reminder's state first, so a second invocation for an
    /// already-fired or completed record shows nothing anywhere.
    pub async fn dispatch(&self, reminder: &Reminder, prefs: &Preferences) -> DispatchReport {
        let mut report = DispatchReport {
            reminder_id: reminder.id.clone(),
            outcomes: Vec::new(),
            suppressed: false,
        };

        if !reminder.is_pending() {
            debug!(
                "reminder {} no longer pending ({:?}), suppressing dispatch",
                reminder.id, reminder.status
            );
            report.suppressed = true;
            return report;
        }

        for channel in &self.channels {
            match channel.deliver(reminder, prefs).await {
                Ok(Delivery::Delivered) => {
                    debug!("reminder {} delivered on {}", reminder.id, channel.name());
                    report
                        .outcomes
                        .push((channel.name(), ChannelOutcome::Delivered));
                }
                Ok(Delivery::Skipped(reason)) => {
                    debug!(
                        "reminder {} skipped on {}: {}",
                        reminder.id,
                        channel.name(),
                        reason
                    );
                    report
                        .outcomes
                        .push((channel.name(), ChannelOutcome::Skipped(reason)));
                }
                Err(e) => {
                    warn!(
                        "channel {} failed for reminder {}: {}",
                        channel.name(),
                        reminder.id,
                        e
                    );
                    report
                        .outcomes
                        .push((channel.name(), ChannelOutcome::Failed(e.to_string())));
                }
            }
        }

        report
    }
}
