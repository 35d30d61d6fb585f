use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;

use reminder_backend::error::AppError;
use reminder_backend::models::{NewReminderRequest, Preferences, Reminder, ReminderStatus};
use reminder_backend::notify::{Delivery, NotificationChannel};
use reminder_backend::services::{NotificationDispatcher, ReminderScheduler};
use reminder_backend::storage::{MemoryStore, ReminderRepository, UserRepository};

/// 配信回数だけ数えるテスト用チャンネル
struct CountingChannel {
    delivered: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationChannel for CountingChannel {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn deliver(
        &self,
        _reminder: &Reminder,
        _prefs: &Preferences,
    ) -> Result<Delivery, AppError> {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(Delivery::Delivered)
    }
}

fn reminder_at(owner: &str, trigger_time: chrono::DateTime<Utc>) -> Reminder {
    Reminder::new(
        owner.to_string(),
        NewReminderRequest {
            title: "Take a break".to_string(),
            description: String::new(),
            trigger_time,
            priority: Default::default(),
            category: Default::default(),
            sound_clip: None,
            repeat: None,
        },
    )
}

struct Rig {
    reminders: Arc<ReminderRepository>,
    delivered: Arc<AtomicUsize>,
    scheduler: Option<ReminderScheduler>,
    wakeup: Arc<Notify>,
}

fn rig(interval_secs: u64) -> Rig {
    let store = Arc::new(MemoryStore::new());
    let reminders = Arc::new(ReminderRepository::new(store.clone()));
    let users = Arc::new(UserRepository::new(store));
    let delivered = Arc::new(AtomicUsize::new(0));
    let dispatcher = Arc::new(NotificationDispatcher::new(vec![Arc::new(
        CountingChannel {
            delivered: delivered.clone(),
        },
    )
        as Arc<dyn NotificationChannel>]));
    let wakeup = Arc::new(Notify::new());
    let scheduler = ReminderScheduler::new(
        reminders.clone(),
        users,
        dispatcher,
        interval_secs,
        wakeup.clone(),
    );
    Rig {
        reminders,
        delivered,
        scheduler: Some(scheduler),
        wakeup,
    }
}

#[tokio::test]
async fn test_due_reminder_fires_exactly_once() {
    let mut rig = rig(1);
    let reminder = rig
        .reminders
        .insert(reminder_at("owner-a", Utc::now()))
        .await
        .unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());

    // 最初のチェックで発火するはず
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    // その後のポーリングで再発火しないことを確認
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    let stored = rig.reminders.load_for_owner("owner-a").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, reminder.id);
    assert_eq!(stored[0].status, ReminderStatus::Fired);

    task.abort();
}

#[tokio::test]
async fn test_future_reminder_fires_after_trigger_elapses() {
    let mut rig = rig(30);
    rig.reminders
        .insert(reminder_at("owner-a", Utc::now() + chrono::Duration::seconds(1)))
        .await
        .unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());

    // トリガー前はまだ発火しない
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 0);

    // スケジューラーは直近のトリガーまでしか眠らない
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    let stored = rig.reminders.load_for_owner("owner-a").await.unwrap();
    assert_eq!(stored[0].status, ReminderStatus::Fired);

    task.abort();
}

#[tokio::test]
async fn test_completed_reminder_is_never_dispatched() {
    let mut rig = rig(1);
    let reminder = rig
        .reminders
        .insert(reminder_at("owner-a", Utc::now()))
        .await
        .unwrap();
    let now = Utc::now();
    rig.reminders
        .modify("owner-a", &reminder.id, |r| r.complete(now))
        .await
        .unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(rig.delivered.load(Ordering::SeqCst), 0);
    let stored = rig.reminders.load_for_owner("owner-a").await.unwrap();
    assert_eq!(stored[0].status, ReminderStatus::Completed);

    task.abort();
}

#[tokio::test]
async fn test_fired_then_completed_reminder_stays_quiet() {
    let mut rig = rig(1);
    let reminder = rig
        .reminders
        .insert(reminder_at("owner-a", Utc::now()))
        .await
        .unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    // 発火済みリマインダーを完了にしても再配信されない
    let now = Utc::now();
    rig.reminders
        .modify("owner-a", &reminder.id, |r| r.complete(now))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);
    task.abort();
}

#[tokio::test]
async fn test_snoozed_reminder_does_not_refire_until_snooze_elapses() {
    let mut rig = rig(1);
    let reminder = rig
        .reminders
        .insert(reminder_at("owner-a", Utc::now()))
        .await
        .unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    // 10 分スヌーズ。次のポーリングでは発火しないはず
    let now = Utc::now();
    rig.reminders
        .modify("owner-a", &reminder.id, |r| r.snooze(10, now))
        .await
        .unwrap();
    rig.wakeup.notify_one();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);
    let stored = rig.reminders.load_for_owner("owner-a").await.unwrap();
    assert_eq!(stored[0].status, ReminderStatus::Snoozed);

    task.abort();
}

#[tokio::test]
async fn test_wakeup_fires_new_reminder_before_next_poll() {
    // ポーリング間隔が長くても wakeup で即チェックされる
    let mut rig = rig(60);
    let task = tokio::spawn(rig.scheduler.take().unwrap().start());
    tokio::time::sleep(Duration::from_millis(200)).await;

    rig.reminders
        .insert(reminder_at("owner-a", Utc::now()))
        .await
        .unwrap();
    rig.wakeup.notify_one();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);

    task.abort();
}

#[tokio::test]
async fn test_repeating_reminder_is_rescheduled_not_fired() {
    let mut rig = rig(1);
    let mut reminder = reminder_at("owner-a", Utc::now());
    reminder.repeat = Some(reminder_backend::models::RepeatFrequency::Daily);
    rig.reminders.insert(reminder).await.unwrap();

    let task = tokio::spawn(rig.scheduler.take().unwrap().start());
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(rig.delivered.load(Ordering::SeqCst), 1);
    let stored = rig.reminders.load_for_owner("owner-a").await.unwrap();
    assert_eq!(stored[0].status, ReminderStatus::Scheduled);
    assert!(stored[0].trigger_time > Utc::now());

    task.abort();
}
