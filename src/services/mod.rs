pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{ChannelOutcome, DispatchReport, NotificationDispatcher};
pub use scheduler::{CheckStats, ReminderScheduler};
