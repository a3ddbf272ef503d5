use chrono::Utc;
use clap::Subcommand;
use checkin_core::{Config, Event};

use super::open_session;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Check in and start tracking
    Start,
    /// Pause tracking
    Pause,
    /// Resume after a pause
    Resume,
    /// Check out and record the session in history
    Checkout,
    /// Discard the active check-in without recording it
    Reset,
    /// Print current timer state as JSON
    Status,
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = open_session(&Config::load()?)?;
    let now = Utc::now();

    let event = match action {
        TimerAction::Start => session.check_in(now),
        TimerAction::Pause => session.pause(now),
        TimerAction::Resume => session.resume(now),
        TimerAction::Reset => session.reset(now),
        TimerAction::Checkout => session
            .check_out(now)?
            .map(|record| Event::CheckedOut { record, at: now }),
        TimerAction::Status => {
            // Fire anything that came due since the last command.
            let reminders = session.tick(now);
            print_event(&session.snapshot(now))?;
            for reminder in reminders {
                print_event(&reminder.to_event())?;
            }
            return Ok(());
        }
    };

    match event {
        Some(event) => print_event(&event),
        None => {
            tracing::warn!(status = ?session.status(), "nothing to do in the current state");
            print_event(&session.snapshot(now))
        }
    }
}
