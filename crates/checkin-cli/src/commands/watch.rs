use std::sync::Arc;

use checkin_core::notify::{ReminderService, SystemClock};
use checkin_core::storage::Config;

use super::open_session;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let session = open_session(&config)?;
    if let Some(state) = session.state() {
        tracing::info!(check_in_id = %state.check_in_id, "watching active check-in");
    }

    let service = ReminderService::new(session, Arc::new(SystemClock))
        .with_poll_interval(config.poll_interval());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(service.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }));
    Ok(())
}
