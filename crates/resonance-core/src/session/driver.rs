use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use super::controller::{HostSignal, SessionController, SessionOutcome};
use crate::audio::AudioBackend;
use crate::events::Event;
use crate::storage::KeyValueStore;
use crate::time::WallClock;
use crate::timer::{RealtimeScheduler, Scheduler};

/// Run a started session on tokio time until it completes or is stopped.
///
/// Sleeps until the scheduler's next deadline, dispatching due tasks, and
/// applies host signals as they arrive. Every produced event is passed to
/// `on_event`. Returns `None` if the controller holds no active session.
pub async fn drive<B, K, C, F>(
    controller: &mut SessionController<RealtimeScheduler, B, K, C>,
    signals: &mut mpsc::Receiver<HostSignal>,
    mut on_event: F,
) -> Option<SessionOutcome>
where
    B: AudioBackend,
    K: KeyValueStore,
    C: WallClock,
    F: FnMut(&Event),
{
    let mut signals_open = true;
    loop {
        if let Some(outcome) = controller.outcome() {
            return Some(outcome.clone());
        }
        if !controller.clock().state().is_active() {
            return None;
        }

        let scheduler = controller.clock().scheduler();
        let wake_at = scheduler
            .next_deadline()
            .map(|deadline| scheduler.instant_at(deadline));

        tokio::select! {
            () = sleep_until(wake_at) => {
                for event in controller.run_due() {
                    on_event(&event);
                }
            }
            signal = signals.recv(), if signals_open => match signal {
                Some(signal) => {
                    debug!(?signal, "host signal");
                    for event in controller.apply_signal(signal) {
                        on_event(&event);
                    }
                }
                None => signals_open = false,
            },
        }
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeBackend;
    use crate::audio::ToneGenerator;
    use crate::protocol::Protocol;
    use crate::recorder::SessionRecorder;
    use crate::storage::MemoryStore;
    use crate::time::FixedClock;
    use crate::timer::{ClockSettings, SessionClock};
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn controller() -> SessionController<RealtimeScheduler, FakeBackend, MemoryStore, FixedClock> {
        let clock = SessionClock::new(RealtimeScheduler::new(), ClockSettings::default());
        let recorder = SessionRecorder::with_clock(
            MemoryStore::new(),
            FixedClock::new(Utc.with_ymd_and_hms(2026, 4, 10, 8, 0, 0).unwrap()),
        );
        SessionController::new(
            clock,
            Some(ToneGenerator::new(FakeBackend::default())),
            recorder,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_completion_on_tokio_time() {
        let mut c = controller();
        let protocol = Protocol::new("short", "Short", "", 5, 2).unwrap();
        c.start(&protocol);

        let (tx, mut rx) = mpsc::channel(4);
        drop(tx);
        let started = Instant::now();
        let mut events = Vec::new();
        let outcome = drive(&mut c, &mut rx, |e| events.push(e.clone()))
            .await
            .unwrap();

        assert!(outcome.completed);
        assert_eq!(outcome.elapsed_secs, 5);
        assert!(outcome.record.is_some());
        assert_eq!(started.elapsed(), Duration::from_secs(5));
        assert_eq!(events.iter().filter(|e| e.is_completion()).count(), 1);
        let cues = events
            .iter()
            .filter(|e| matches!(e, Event::BreathingCue { .. }))
            .count();
        assert_eq!(cues, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_signal_ends_the_session() {
        let mut c = controller();
        c.start(&Protocol::quick());

        let (tx, mut rx) = mpsc::channel(4);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            let _ = tx.send(HostSignal::Pause).await;
            tokio::time::sleep(Duration::from_secs(10)).await;
            let _ = tx.send(HostSignal::Stop).await;
        });

        let outcome = drive(&mut c, &mut rx, |_| {}).await.unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.elapsed_secs, 3);
        assert_eq!(outcome.record.unwrap().completed_duration_secs, 3);
        assert_eq!(c.clock().scheduler().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_controller_returns_immediately() {
        let mut c = controller();
        let (_tx, mut rx) = mpsc::channel(1);
        assert!(drive(&mut c, &mut rx, |_| {}).await.is_none());
    }
}
