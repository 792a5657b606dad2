use clap::Subcommand;

use super::{open_recorder, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals, completion rate, streak and recent activity
    Show,
}

pub fn run(action: StatsAction) -> CliResult {
    let recorder = open_recorder()?;

    match action {
        StatsAction::Show => {
            let stats = recorder.compute_stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
