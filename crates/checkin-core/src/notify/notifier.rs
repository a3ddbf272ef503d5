//! Notification delivery.
//!
//! A [`Notifier`] only displays things; deciding *when* to notify belongs to
//! the scheduler. Delivery is fire-and-forget: callers log failures and move on.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Notification permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    /// The user has not answered yet.
    Default,
}

impl Permission {
    pub fn is_granted(self) -> bool {
        self == Permission::Granted
    }
}

pub trait Notifier: Send + Sync {
    /// Ask for permission to display notifications. May prompt the user.
    fn request_permission(&self) -> Permission;

    /// Display a notification.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!(%title, %body, "notification");
        Ok(())
    }
}

/// A delivered notification, as captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub title: String,
    pub body: String,
}

/// Keeps every notification in memory. Useful for tests and previews.
#[derive(Debug)]
pub struct RecordingNotifier {
    permission: Permission,
    sent: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::with_permission(Permission::Granted)
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_permission(permission: Permission) -> Self {
        Self {
            permission,
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        match self.sent.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn request_permission(&self) -> Permission {
        self.permission
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::DeliveryFailed("recording notifier set to fail".into()));
        }
        let mut guard = match self.sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(SentNotification {
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
