use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{Preferences, Reminder};

use super::{Delivery, NotificationChannel};

/// What the audio surface should play for a due reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SoundCue {
    Clip { source: String },
    Tone { start_hz: u32, end_hz: u32, duration_ms: u32 },
    Silent,
}

impl SoundCue {
    /// The synthesized fallback beep: half a second, 800 Hz easing to 600.
    pub fn default_tone() -> Self {
        SoundCue::Tone {
            start_hz: 800,
            end_hz: 600,
            duration_ms: 500,
        }
    }
}

/// Picks the cue for a reminder: its own clip, then the category clip from
/// the sound directory, then the synthesized tone.
#[derive(Clone)]
pub struct SoundResolver {
    sound_dir: Option<PathBuf>,
}

impl SoundResolver {
    pub fn new(sound_dir: Option<PathBuf>) -> Self {
        Self { sound_dir }
    }

    pub fn resolve(&self, reminder: &Reminder) -> SoundCue {
        if let Some(clip) = &reminder.sound_clip {
            return SoundCue::Clip {
                source: clip.clone(),
            };
        }
        if let Some(dir) = &self.sound_dir {
            let path = dir.join(format!("{}.mp3", reminder.category.as_str()));
            if path.exists() {
                return SoundCue::Clip {
                    source: path.to_string_lossy().into_owned(),
                };
            }
        }
        SoundCue::default_tone()
    }
}

/// The playback surface. The service stops at this seam; real output lives
/// with whatever embeds it.
pub trait AudioSink: Send + Sync {
    fn play(&self, cue: &SoundCue) -> Result<(), AppError>;
}

/// Default sink: logs the cue and reports success.
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, cue: &SoundCue) -> Result<(), AppError> {
        debug!("audio cue: {:?}", cue);
        Ok(())
    }
}

pub struct AudioChannel {
    resolver: SoundResolver,
    sink: Arc<dyn AudioSink>,
}

impl AudioChannel {
    pub fn new(resolver: SoundResolver, sink: Arc<dyn AudioSink>) -> Self {
        Self { resolver, sink }
    }
}

#[async_trait]
impl NotificationChannel for AudioChannel {
    fn name(&self) -> &'static str {
        "audio"
    }

    async fn deliver(
        &self,
        reminder: &Reminder,
        prefs: &Preferences,
    ) -> Result<Delivery, AppError> {
        if !prefs.sound_enabled {
            return Ok(Delivery::Skipped("sound disabled by owner"));
        }

        let cue = self.resolver.resolve(reminder);
        match self.sink.play(&cue) {
            Ok(()) => Ok(Delivery::Delivered),
            Err(e) => {
                warn!("could not play {:?}: {}", cue, e);
                let fallback = SoundCue::default_tone();
                if cue != fallback && self.sink.play(&fallback).is_ok() {
                    return Ok(Delivery::Delivered);
                }
                // Total failure ends in silence, never an error.
                Ok(Delivery::Skipped("silenced"))
            }
        }
    }
}
