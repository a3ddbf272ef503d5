mod config;
pub mod database;
pub mod migrations;
pub mod store;

pub use config::{target_hours_to_seconds, AppSettings, Config, NotificationsConfig};
pub use database::Database;
pub use store::{HistoryStore, MemoryStore, SessionStore};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the directory holding the database and config file.
///
/// `CHECKIN_DATA_DIR` wins when set. Otherwise `~/.config/checkin`, or
/// `~/.config/checkin-dev` with `CHECKIN_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("CHECKIN_DATA_DIR") {
        Some(explicit) if !explicit.is_empty() => PathBuf::from(explicit),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("CHECKIN_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("checkin-dev")
            } else {
                base_dir.join("checkin")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
