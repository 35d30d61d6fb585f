use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::NotificationDispatcher;
use crate::storage::{ReminderRepository, UserRepository};

/// リマインダー・スケジューラー
/// 定期的に期限切れリマインダーを検出して通知を実行
///
/// The single firing authority: API writes never show notifications
/// themselves, they only poke `wakeup` so the next check happens sooner.
pub struct ReminderScheduler {
    reminders: Arc<ReminderRepository>,
    users: Arc<UserRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    interval: Duration,
    wakeup: Arc<Notify>,
}

#[derive(Debug, Default)]
pub struct CheckStats {
    pub due: usize,
    pub fired: usize,
    pub rescheduled: usize,
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<ReminderRepository>,
        users: Arc<UserRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        interval_secs: u64,
        wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            reminders,
            users,
            dispatcher,
            interval: Duration::from_secs(interval_secs),
            wakeup,
        }
    }

    /// 期限チェックを無限ループで定期実行
    pub async fn start(self) {
        info!(
            "Starting reminder scheduler (interval: {:?})",
            self.interval
        );

        loop {
            let sleep_for = self.next_sleep().await;
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.wakeup.notified() => {}
            }

            match self.run_check().await {
                Ok(stats) if stats.due > 0 => {
                    info!(
                        "Due check completed - {} due, {} fired, {} repeats rescheduled",
                        stats.due, stats.fired, stats.rescheduled
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Due check failed: {:?}", e);
                    // エラーが発生してもループは継続
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }

    /// Sleeps at most one poll interval, less when a pending trigger is
    /// closer than that.
    async fn next_sleep(&self) -> Duration {
        let now = Utc::now();
        match self.reminders.earliest_pending_trigger().await {
            Ok(Some(trigger)) if trigger > now => {
                let until = (trigger - now).to_std().unwrap_or(Duration::ZERO);
                until.min(self.interval)
            }
            Ok(Some(_)) => Duration::ZERO,
            Ok(None) => self.interval,
            Err(e) => {
                warn!("could not read pending triggers: {:?}", e);
                self.interval
            }
        }
    }

    /// One poll pass: everything pending with an elapsed trigger gets one
    /// dispatch attempt, then the batch is transitioned and saved once.
    async fn run_check(&self) -> Result<CheckStats, AppError> {
        let now = Utc::now();
        let due = self.reminders.due_reminders(now).await?;
        if due.is_empty() {
            return Ok(CheckStats::default());
        }

        let prefs = self.users.preferences_by_id().await?;
        for reminder in &due {
            let owner_prefs = prefs.get(&reminder.owner_id).copied().unwrap_or_default();
            self.dispatcher.dispatch(reminder, &owner_prefs).await;
        }

        let ids: Vec<String> = due.iter().map(|r| r.id.clone()).collect();
        let (fired, rescheduled) = self.reminders.mark_fired(&ids, now).await?;

        Ok(CheckStats {
            due: due.len(),
            fired,
            rescheduled,
        })
    }
}
