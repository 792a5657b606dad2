use clap::Subcommand;
use resonance_core::storage::{get_json_value_by_path, set_json_value_by_path};
use resonance_core::{Protocol, Settings};

use super::{open_recorder, CliResult};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Get a preference (e.g. "volume", "breathingCuesEnabled")
    Get { key: String },
    /// Set a preference
    Set { key: String, value: String },
    /// List all preferences
    List,
    /// Restore default preferences
    Reset,
}

/// Settings as a JSON tree. Goes through the string form so `f32` values
/// print as written rather than widened.
fn settings_json(settings: &Settings) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_str(&serde_json::to_string(settings)?)
}

pub fn run(action: SettingsAction) -> CliResult {
    let mut recorder = open_recorder()?;

    match action {
        SettingsAction::Get { key } => {
            let json = settings_json(&recorder.settings())?;
            match get_json_value_by_path(&json, &key) {
                Some(serde_json::Value::String(s)) => println!("{s}"),
                Some(other) => println!("{other}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        SettingsAction::Set { key, value } => {
            let mut json = settings_json(&recorder.settings())?;
            set_json_value_by_path(&mut json, &key, &value)?;
            let settings: Settings = serde_json::from_value(json)?;
            Protocol::find(&settings.default_protocol_id)?;
            recorder.replace_settings(settings)?;
            println!("ok");
        }
        SettingsAction::List => {
            println!("{}", serde_json::to_string_pretty(&recorder.settings())?);
        }
        SettingsAction::Reset => {
            recorder.replace_settings(Settings::default())?;
            println!("settings reset to defaults");
        }
    }
    Ok(())
}
