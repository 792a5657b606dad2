mod clock;
mod scheduler;

pub use clock::{ClockSettings, ClockState, SessionClock, TimerState, DEFAULT_DRIFT_CORRECTION_LIMIT};
pub use scheduler::{ManualScheduler, RealtimeScheduler, Scheduler, TaskHandle, TaskQueue, TimerTask};
