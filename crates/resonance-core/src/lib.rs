//! # Resonance Core Library
//!
//! Core logic for Resonance, a guided-breathing session timer. A session
//! plays a steady low reference tone, counts down a fixed protocol, prompts
//! breathing at regular intervals and records the outcome.
//!
//! ## Architecture
//!
//! - **Session Clock**: 1-second countdown state machine driven by an
//!   injected [`Scheduler`], with breathing cues and visibility drift correction
//! - **Tone Generator**: fixed-frequency sine tone over a pluggable audio backend
//! - **Recorder**: session history, streak, statistics, settings and
//!   JSON export/import over a [`KeyValueStore`]
//! - **Session Controller**: keeps tone and clock in lockstep and records
//!   outcomes; [`drive`] runs it on tokio time
//!
//! ## Key Components
//!
//! - [`SessionClock`]: countdown state machine
//! - [`ToneGenerator`]: reference tone
//! - [`SessionRecorder`]: persistence and statistics
//! - [`SessionController`]: orchestration
//! - [`Config`]: application configuration

pub mod audio;
pub mod error;
pub mod events;
pub mod protocol;
pub mod recorder;
pub mod session;
pub mod storage;
pub mod time;
pub mod timer;

pub use audio::{AudioBackend, AudioDevice, NullBackend, PowerState, ToneGenerator};
pub use error::{AudioError, ConfigError, CoreError, RecorderError, StoreError, ValidationError};
pub use events::Event;
pub use protocol::Protocol;
pub use recorder::{SessionRecord, SessionRecorder, Settings, SettingsPatch, Stats, StreakState};
pub use session::{drive, HostSignal, SessionController, SessionOutcome};
pub use storage::{Config, KeyValueStore, MemoryStore, SqliteStore};
pub use time::{FixedClock, SystemClock, WallClock};
pub use timer::{
    ClockSettings, ClockState, ManualScheduler, RealtimeScheduler, Scheduler, SessionClock,
    TimerState,
};
