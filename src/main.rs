use std::sync::Arc;

use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reminder_backend::api::router;
use reminder_backend::config::AppConfig;
use reminder_backend::notify::{
    AudioChannel, NotificationChannel, NotificationFeed, NullSink, PopupChannel, SoundResolver,
    SystemChannel,
};
use reminder_backend::push::{NoopPushClient, PushClient, PushConfig, PushHttpClient};
use reminder_backend::services::{NotificationDispatcher, ReminderScheduler};
use reminder_backend::state::AppState;
use reminder_backend::storage::{FileStore, ReminderRepository, UserRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "reminder_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env();

    let store = Arc::new(FileStore::open(&config.data_dir)?);
    let reminders = Arc::new(ReminderRepository::new(store.clone()));
    let users = Arc::new(UserRepository::new(store));

    let push: Arc<dyn PushClient> = match PushConfig::new_from_env() {
        Some(push_config) => Arc::new(PushHttpClient::new(push_config)?),
        None => {
            info!("No push gateway configured, system notifications disabled");
            Arc::new(NoopPushClient)
        }
    };

    let feed = Arc::new(NotificationFeed::new());
    let resolver = SoundResolver::new(config.sound_dir.clone());
    let dispatcher = Arc::new(NotificationDispatcher::new(vec![
        Arc::new(SystemChannel::new(push)) as Arc<dyn NotificationChannel>,
        Arc::new(PopupChannel::new(feed.clone(), resolver.clone())) as Arc<dyn NotificationChannel>,
        Arc::new(AudioChannel::new(resolver, Arc::new(NullSink))) as Arc<dyn NotificationChannel>,
    ]));

    let wakeup = Arc::new(Notify::new());
    let scheduler = ReminderScheduler::new(
        reminders.clone(),
        users.clone(),
        dispatcher,
        config.poll_interval_secs,
        wakeup.clone(),
    );
    tokio::spawn(scheduler.start());

    let state = AppState {
        config: config.clone(),
        reminders,
        users,
        feed,
        scheduler_wakeup: wakeup,
    };
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
