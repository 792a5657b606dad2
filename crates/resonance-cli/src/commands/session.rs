use std::io::Write;

use clap::Subcommand;
use resonance_core::storage::Config;
use resonance_core::{
    drive, Event, HostSignal, Protocol, RealtimeScheduler, SessionClock, SessionController,
    SessionOutcome, SessionRecorder, SqliteStore, ToneGenerator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::CliResult;

#[cfg(feature = "rodio")]
type Backend = resonance_core::audio::RodioBackend;
#[cfg(not(feature = "rodio"))]
type Backend = resonance_core::NullBackend;

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a session and run it in the foreground.
    ///
    /// Type pause, resume, stop, hide, show, volume <0-1> or cues on|off
    /// followed by Enter to control it. Ctrl-C stops the session.
    Start {
        /// Protocol id; defaults to the stored preference
        #[arg(long)]
        protocol: Option<String>,
        /// Run without the reference tone
        #[arg(long)]
        no_tone: bool,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SessionAction) -> CliResult {
    match action {
        SessionAction::Start {
            protocol,
            no_tone,
            json,
        } => start(protocol, no_tone, json),
    }
}

fn start(protocol: Option<String>, no_tone: bool, json: bool) -> CliResult {
    let config = Config::load()?;
    let recorder = SessionRecorder::new(SqliteStore::open()?).with_config(config.recorder_config());
    let settings = recorder.settings();
    let protocol = Protocol::find(protocol.as_deref().unwrap_or(&settings.default_protocol_id))?;
    let with_tone = config.audio.enabled && !no_tone;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let outcome = runtime.block_on(async {
        let clock = SessionClock::new(
            RealtimeScheduler::new(),
            config.clock_settings(settings.breathing_cues_enabled),
        );
        let tone = with_tone.then(|| ToneGenerator::new(Backend::default()));
        let mut controller = SessionController::new(clock, tone, recorder);

        let (tx, mut rx) = mpsc::channel(16);
        spawn_stdin_reader(tx.clone());
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(HostSignal::Stop).await;
            }
        });

        if !json {
            println!(
                "{} ({} min). Type 'stop' or press Ctrl-C to end.",
                protocol.name(),
                protocol.duration_seconds() / 60
            );
        }
        for event in controller.start(&protocol) {
            render(&event, json);
        }
        let outcome = drive(&mut controller, &mut rx, |event| render(event, json)).await;
        controller.teardown();
        outcome
    });
    // stdin reads block a worker thread; do not wait for them.
    runtime.shutdown_background();

    if !json {
        print_summary(outcome.as_ref());
    }
    Ok(())
}

fn spawn_stdin_reader(tx: mpsc::Sender<HostSignal>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(signal) = parse_signal(&line) else {
                if !line.trim().is_empty() {
                    eprintln!("unrecognised command: {}", line.trim());
                }
                continue;
            };
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    });
}

fn parse_signal(line: &str) -> Option<HostSignal> {
    let mut words = line.split_whitespace();
    let signal = match (words.next()?, words.next()) {
        ("pause", None) => HostSignal::Pause,
        ("resume", None) => HostSignal::Resume,
        ("stop" | "quit", None) => HostSignal::Stop,
        ("hide", None) => HostSignal::Visibility { hidden: true },
        ("show", None) => HostSignal::Visibility { hidden: false },
        ("volume", Some(value)) => HostSignal::SetVolume(value.parse().ok()?),
        ("cues", Some("on")) => HostSignal::SetBreathingCues(true),
        ("cues", Some("off")) => HostSignal::SetBreathingCues(false),
        _ => return None,
    };
    words.next().is_none().then_some(signal)
}

fn render(event: &Event, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("error: {e}"),
        }
        return;
    }

    match event {
        Event::TimerUpdate { state, .. } => {
            let status = if state.paused { "  paused" } else { "" };
            print!(
                "\r{:02}:{:02} remaining  {:>3.0}%{status}        ",
                state.remaining_seconds / 60,
                state.remaining_seconds % 60,
                state.progress_percent,
            );
            let _ = std::io::stdout().flush();
        }
        Event::BreathingCue { .. } => {
            println!("\n  ~ breathe ~");
        }
        Event::SessionCompleted { .. } => {
            println!("\nSession complete.");
        }
        Event::SessionRecorded { .. } => {}
        Event::AudioUnavailable { reason, .. } => {
            eprintln!("\nno tone: {reason}");
        }
        Event::StorageFailed { message, .. } => {
            eprintln!("\nsession not saved: {message}");
        }
    }
}

fn print_summary(outcome: Option<&SessionOutcome>) {
    let Some(outcome) = outcome else {
        return;
    };
    let minutes = outcome.elapsed_secs / 60;
    let seconds = outcome.elapsed_secs % 60;
    if outcome.completed {
        println!("Completed {} ({minutes}m {seconds:02}s).", outcome.protocol_id);
    } else {
        println!("\nStopped after {minutes}m {seconds:02}s.");
    }
    if outcome.record.is_none() && outcome.elapsed_secs > 0 {
        println!("This session was not recorded.");
    }
}
