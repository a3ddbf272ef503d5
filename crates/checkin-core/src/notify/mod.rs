//! Reminders for long-running check-ins.
//!
//! [`scheduler`] decides when a reminder is due, [`notifier`] displays it,
//! and [`service`] drives both from a tokio task.

pub mod notifier;
pub mod scheduler;
pub mod service;

pub use notifier::{LogNotifier, Notifier, Permission, RecordingNotifier, SentNotification};
pub use scheduler::{
    format_target, NotificationScheduler, Reminder, ReminderKind, ReminderPhase, ScheduleEntry,
    DEFAULT_REMINDER_INTERVAL_SECS, DEFAULT_TARGET_SECS,
};
pub use service::{Clock, ReminderHandle, ReminderService, SystemClock};
