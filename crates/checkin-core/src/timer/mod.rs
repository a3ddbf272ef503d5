mod engine;
mod state;

pub use engine::{TimerEngine, TimerStatus};
pub use state::TimerState;
