use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration, read once at startup. Every knob has a default so
/// the service runs with an empty environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub snooze_minutes: i64,
    pub sound_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn new_from_env() -> Self {
        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 3000)));

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let snooze_minutes = env::var("SNOOZE_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let sound_dir = env::var("SOUND_DIR").ok().map(PathBuf::from);

        Self {
            bind_addr,
            data_dir,
            poll_interval_secs,
            snooze_minutes,
            sound_dir,
        }
    }
}
