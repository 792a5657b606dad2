use clap::Subcommand;

use super::{open_recorder, CliResult};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// Recorded sessions, newest first
    List {
        /// Show at most this many sessions
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Current and longest streak
    Streak,
}

pub fn run(action: HistoryAction) -> CliResult {
    let recorder = open_recorder()?;

    match action {
        HistoryAction::List { limit } => {
            let mut sessions = recorder.sessions();
            if let Some(limit) = limit {
                sessions.truncate(limit);
            }
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        HistoryAction::Streak => {
            println!("{}", serde_json::to_string_pretty(&recorder.streak())?);
        }
    }
    Ok(())
}
