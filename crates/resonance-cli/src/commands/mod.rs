pub mod config;
pub mod data;
pub mod history;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod stats;

use resonance_core::storage::Config;
use resonance_core::{SessionRecorder, SqliteStore};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Recorder over the on-disk store, with retention limits from the config.
pub fn open_recorder() -> Result<SessionRecorder<SqliteStore>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = SqliteStore::open()?;
    Ok(SessionRecorder::new(store).with_config(config.recorder_config()))
}
