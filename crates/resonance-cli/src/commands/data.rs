use std::path::PathBuf;

use clap::Subcommand;

use super::{open_recorder, CliResult};

#[derive(Subcommand)]
pub enum DataAction {
    /// Write sessions, settings and streak to a JSON file
    Export {
        /// Output path; defaults to resonance-export-YYYY-MM-DD.json
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace stored data with the sections of an export file
    Import { path: PathBuf },
    /// Delete all recorded sessions, settings and streak
    Clear,
}

pub fn run(action: DataAction) -> CliResult {
    let mut recorder = open_recorder()?;

    match action {
        DataAction::Export { output } => {
            let json = recorder.export_data()?;
            let path = output.unwrap_or_else(|| PathBuf::from(recorder.export_file_name()));
            std::fs::write(&path, json)?;
            println!("{}", path.display());
        }
        DataAction::Import { path } => {
            let json = std::fs::read_to_string(&path)?;
            let summary = recorder.import_data(&json)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        DataAction::Clear => {
            recorder.clear_all_data()?;
            println!("all data cleared");
        }
    }
    Ok(())
}
