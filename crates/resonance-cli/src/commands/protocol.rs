use clap::Subcommand;
use resonance_core::Protocol;

use super::CliResult;

#[derive(Subcommand)]
pub enum ProtocolAction {
    /// List built-in protocols
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: ProtocolAction) -> CliResult {
    match action {
        ProtocolAction::List { json } => {
            let catalog = Protocol::catalog();
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
                return Ok(());
            }
            for protocol in &catalog {
                println!(
                    "{:<10} {:<20} {:>4} min, cue every {}s",
                    protocol.id(),
                    protocol.name(),
                    protocol.duration_seconds() / 60,
                    protocol.breathing_cue_interval_seconds(),
                );
            }
        }
    }
    Ok(())
}
