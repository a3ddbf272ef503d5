use checkin_core::error::NotifyError;
use checkin_core::notify::{Notifier, Permission};

/// Prints notifications to stderr, keeping stdout for JSON output.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        eprintln!("[{}] {title}: {body}", chrono::Local::now().format("%H:%M:%S"));
        Ok(())
    }
}
