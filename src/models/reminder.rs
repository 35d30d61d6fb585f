use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Health,
    Shopping,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Health => "health",
            Category::Shopping => "shopping",
            Category::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl RepeatFrequency {
    fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RepeatFrequency::Daily => from + Duration::days(1),
            RepeatFrequency::Weekly => from + Duration::weeks(1),
            RepeatFrequency::Monthly => from
                .checked_add_months(Months::new(1))
                .unwrap_or(from + Duration::days(30)),
        }
    }
}

/// Explicit reminder state. `Scheduled` and `Snoozed` are pending (the
/// due check watches them), `Fired` and `Completed` are never dispatched
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Scheduled,
    Fired,
    Snoozed,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub trigger_time: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub sound_clip: Option<String>,
    #[serde(default)]
    pub repeat: Option<RepeatFrequency>,
    pub status: ReminderStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Reminder {
    pub fn new(owner_id: String, req: NewReminderRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id,
            title: req.title,
            description: req.description,
            trigger_time: req.trigger_time,
            priority: req.priority,
            category: req.category,
            sound_clip: req.sound_clip,
            repeat: req.repeat,
            status: ReminderStatus::Scheduled,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self.status,
            ReminderStatus::Scheduled | ReminderStatus::Snoozed
        )
    }

    /// A trigger time exactly equal to `now` counts as due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.trigger_time <= now
    }

    /// Transition after the dispatcher has been handed this reminder.
    /// Repeating reminders re-arm at the next occurrence instead of
    /// going quiet.
    pub fn fire(&mut self, now: DateTime<Utc>) {
        match self.repeat {
            Some(freq) => {
                let mut next = self.trigger_time;
                while next <= now {
                    next = freq.advance(next);
                }
                self.trigger_time = next;
                self.status = ReminderStatus::Scheduled;
            }
            None => self.status = ReminderStatus::Fired,
        }
    }

    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = ReminderStatus::Completed;
        self.completed_at = Some(now);
    }

    /// Reopens a completed reminder. A trigger that already elapsed maps
    /// back to `Fired` so reopening never causes a re-fire.
    pub fn uncomplete(&mut self, now: DateTime<Utc>) {
        self.completed_at = None;
        self.status = if self.trigger_time <= now {
            ReminderStatus::Fired
        } else {
            ReminderStatus::Scheduled
        };
    }

    pub fn snooze(&mut self, minutes: i64, now: DateTime<Utc>) {
        self.trigger_time = now + Duration::minutes(minutes);
        self.status = ReminderStatus::Snoozed;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReminderRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub trigger_time: DateTime<Utc>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub sound_clip: Option<String>,
    #[serde(default)]
    pub repeat: Option<RepeatFrequency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReminderRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub trigger_time: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub sound_clip: Option<String>,
    pub repeat: Option<RepeatFrequency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnoozeRequest {
    #[serde(default)]
    pub minutes: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Complete,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<String>,
}
