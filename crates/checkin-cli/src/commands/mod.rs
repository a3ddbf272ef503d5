pub mod config;
pub mod history;
pub mod timer;
pub mod watch;

use std::sync::Arc;

use checkin_core::storage::{Config, Database};
use checkin_core::CheckInSession;

use crate::notifier::ConsoleNotifier;

/// Open the session stored in the data directory.
pub fn open_session(config: &Config) -> Result<CheckInSession<Database>, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    Ok(CheckInSession::open(
        db,
        config.settings(),
        Arc::new(ConsoleNotifier),
        chrono::Utc::now(),
    ))
}
