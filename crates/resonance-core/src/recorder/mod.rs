//! Session recorder and statistics.
//!
//! Turns finished sessions into persisted [`SessionRecord`]s, keeps the
//! day-based [`StreakState`] as a running summary, derives [`Stats`] and
//! moves all three documents in and out through a JSON export.

mod export;
mod model;
mod session_recorder;
mod stats;

pub use export::{export_file_name, ExportDocument, ImportDocument, ImportSummary, EXPORT_FORMAT_VERSION};
pub use model::{SessionRecord, Settings, SettingsPatch, Stats, StreakState};
pub use session_recorder::{
    RecorderConfig, SessionRecorder, SESSIONS_KEY, SETTINGS_KEY, STREAK_KEY,
};
pub use stats::{apply_retention, compute_stats};
