pub mod reminder;
pub mod user;

pub use reminder::{
    BulkAction, BulkRequest, Category, NewReminderRequest, Priority, Reminder, ReminderStatus,
    RepeatFrequency, SnoozeRequest, UpdateReminderRequest,
};
pub use user::{
    AuthResponse, LoginRequest, Preferences, PublicUser, RegisterRequest, Session, User,
};
