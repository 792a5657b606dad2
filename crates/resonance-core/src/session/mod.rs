//! Session orchestration.
//!
//! [`SessionController`] keeps the tone in step with the session clock and
//! hands finished sessions to the recorder. [`drive`] runs a controller on
//! tokio time, reacting to [`HostSignal`]s from the embedding surface.

mod controller;
mod driver;

pub use controller::{HostSignal, SessionController, SessionOutcome};
pub use driver::drive;
