//! Session clock implementation.
//!
//! The session clock is a countdown state machine at 1-second resolution.
//! It does not use internal threads: it schedules [`TimerTask`]s on an
//! injected [`Scheduler`] and the caller calls [`SessionClock::run_due`]
//! whenever the scheduler has work ready.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused -> (Completed | Stopped)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut clock = SessionClock::new(ManualScheduler::default(), ClockSettings::default());
//! clock.start(&Protocol::quick());
//! clock.scheduler_mut().advance(Duration::from_secs(1));
//! let events = clock.run_due(); // one TimerUpdate
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scheduler::{Scheduler, TaskHandle, TimerTask};
use crate::events::Event;
use crate::protocol::Protocol;

/// Hidden intervals shorter than this are subtracted from the countdown.
pub const DEFAULT_DRIFT_CORRECTION_LIMIT: Duration = Duration::from_secs(10);

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl ClockState {
    pub fn is_active(self) -> bool {
        matches!(self, ClockState::Running | ClockState::Paused)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, ClockState::Completed | ClockState::Stopped)
    }
}

/// Countdown snapshot handed to the UI. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub remaining_seconds: u64,
    pub total_seconds: u64,
    /// 0.0 ..= 100.0
    pub progress_percent: f64,
    pub running: bool,
    pub paused: bool,
    pub elapsed_seconds: u64,
}

/// Tunables for the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSettings {
    /// Hidden intervals at or above this are left uncorrected.
    pub drift_correction_limit: Duration,
    pub breathing_cues_enabled: bool,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            drift_correction_limit: DEFAULT_DRIFT_CORRECTION_LIMIT,
            breathing_cues_enabled: true,
        }
    }
}

/// Core session clock.
#[derive(Debug)]
pub struct SessionClock<S: Scheduler> {
    scheduler: S,
    settings: ClockSettings,
    state: ClockState,
    protocol_id: Option<String>,
    total_secs: u64,
    remaining_secs: u64,
    started_at: Option<DateTime<Utc>>,
    tick: Option<TaskHandle>,
    cues: Vec<TaskHandle>,
    /// Set while the host surface is hidden.
    hidden: Option<HiddenInterval>,
}

/// Running time accumulated while the host surface is hidden. Paused
/// stretches are excluded.
#[derive(Debug, Clone, Copy, Default)]
struct HiddenInterval {
    running_since: Option<Duration>,
    accumulated: Duration,
}

impl HiddenInterval {
    fn suspend(&mut self, now: Duration) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_sub(since);
        }
    }

    fn total(&self, now: Duration) -> Duration {
        self.accumulated + self.running_since.map_or(Duration::ZERO, |since| now.saturating_sub(since))
    }
}

impl<S: Scheduler> SessionClock<S> {
    pub fn new(scheduler: S, settings: ClockSettings) -> Self {
        Self {
            scheduler,
            settings,
            state: ClockState::Idle,
            protocol_id: None,
            total_secs: 0,
            remaining_secs: 0,
            started_at: None,
            tick: None,
            cues: Vec::new(),
            hidden: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs.saturating_sub(self.remaining_secs)
    }

    pub fn protocol_id(&self) -> Option<&str> {
        self.protocol_id.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn settings(&self) -> &ClockSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// 0.0 ..= 100.0 progress through the session.
    pub fn progress_percent(&self) -> f64 {
        if self.total_secs == 0 {
            return 0.0;
        }
        let done = self.total_secs.saturating_sub(self.remaining_secs) as f64;
        (done / self.total_secs as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn snapshot(&self) -> TimerState {
        TimerState {
            remaining_seconds: self.remaining_secs,
            total_seconds: self.total_secs,
            progress_percent: self.progress_percent(),
            running: self.state.is_active(),
            paused: self.state == ClockState::Paused,
            elapsed_seconds: self.elapsed_secs(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session. Only valid from `Idle`.
    pub fn start(&mut self, protocol: &Protocol) -> Option<Event> {
        if self.state != ClockState::Idle {
            return None;
        }
        let duration = protocol.duration_seconds();
        if duration == 0 {
            return None;
        }

        self.total_secs = duration;
        self.remaining_secs = duration;
        self.protocol_id = Some(protocol.id().to_string());
        self.started_at = Some(self.scheduler.wall_now());
        self.hidden = None;
        self.state = ClockState::Running;

        self.tick = Some(self.scheduler.schedule_repeating(TICK_PERIOD, TimerTask::Tick));
        self.cues = protocol
            .cue_offsets()
            .into_iter()
            .map(|offset_secs| {
                self.scheduler.schedule_once(
                    Duration::from_secs(offset_secs),
                    TimerTask::BreathingCue { offset_secs },
                )
            })
            .collect();

        debug!(
            protocol = protocol.id(),
            duration_secs = duration,
            cues = self.cues.len(),
            "session clock started"
        );
        Some(self.update_event())
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != ClockState::Running {
            return None;
        }
        self.state = ClockState::Paused;
        let now = self.scheduler.elapsed();
        if let Some(hidden) = &mut self.hidden {
            hidden.suspend(now);
        }
        debug!(remaining_secs = self.remaining_secs, "session clock paused");
        Some(self.update_event())
    }

    pub fn resume(&mut self) -> Option<Event> {
        if self.state != ClockState::Paused {
            return None;
        }
        self.state = ClockState::Running;
        let now = self.scheduler.elapsed();
        if let Some(hidden) = &mut self.hidden {
            hidden.running_since = Some(now);
        }
        debug!(remaining_secs = self.remaining_secs, "session clock resumed");
        Some(self.update_event())
    }

    /// End the session early. No completion event is produced.
    pub fn stop(&mut self) -> Option<Event> {
        if !self.state.is_active() {
            return None;
        }
        self.cancel_all();
        self.state = ClockState::Stopped;
        debug!(remaining_secs = self.remaining_secs, "session clock stopped");
        Some(self.update_event())
    }

    /// Cancel every pending schedule, from any state.
    pub fn teardown(&mut self) {
        self.cancel_all();
        if self.state.is_active() {
            self.state = ClockState::Stopped;
        }
        self.hidden = None;
    }

    /// Return a finished clock to `Idle` so another session can start.
    pub fn reset(&mut self) -> bool {
        if self.state.is_active() {
            return false;
        }
        self.cancel_all();
        self.state = ClockState::Idle;
        self.protocol_id = None;
        self.total_secs = 0;
        self.remaining_secs = 0;
        self.started_at = None;
        self.hidden = None;
        true
    }

    pub fn set_breathing_cues_enabled(&mut self, enabled: bool) {
        self.settings.breathing_cues_enabled = enabled;
    }

    pub fn set_drift_correction_limit(&mut self, limit: Duration) {
        self.settings.drift_correction_limit = limit;
    }

    /// Host surface became hidden (`true`) or visible again (`false`).
    ///
    /// Returns an update when the countdown was corrected for drift.
    pub fn on_visibility_change(&mut self, hidden: bool) -> Option<Event> {
        let now = self.scheduler.elapsed();
        if hidden {
            if self.hidden.is_none() {
                let running_since = (self.state == ClockState::Running).then_some(now);
                self.hidden = Some(HiddenInterval {
                    running_since,
                    accumulated: Duration::ZERO,
                });
            }
            return None;
        }

        let interval = self.hidden.take()?;
        if self.state != ClockState::Running {
            return None;
        }
        let drift_secs = interval.total(now).as_secs();
        if drift_secs == 0 {
            return None;
        }

        // Restart the tick grid from now so overdue ticks are not replayed
        // on top of the correction.
        self.rearm_tick();

        if Duration::from_secs(drift_secs) >= self.settings.drift_correction_limit {
            debug!(drift_secs, "hidden interval too long, left uncorrected");
            return None;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(drift_secs);
        debug!(drift_secs, remaining_secs = self.remaining_secs, "corrected drift");
        Some(self.update_event())
    }

    /// Dispatch every task the scheduler has ready.
    pub fn run_due(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Some(task) = self.scheduler.pop_due() {
            events.extend(self.dispatch(task));
        }
        events
    }

    /// Handle one scheduled task.
    pub fn dispatch(&mut self, task: TimerTask) -> Vec<Event> {
        match task {
            TimerTask::Tick => self.on_tick(),
            TimerTask::BreathingCue { offset_secs } => self.on_cue(offset_secs).into_iter().collect(),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn on_tick(&mut self) -> Vec<Event> {
        if self.state != ClockState::Running {
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        let mut events = vec![self.update_event()];
        if self.remaining_secs == 0 {
            events.extend(self.complete());
        }
        events
    }

    fn on_cue(&mut self, offset_secs: u64) -> Option<Event> {
        if self.state != ClockState::Running || !self.settings.breathing_cues_enabled {
            return None;
        }
        Some(Event::BreathingCue {
            offset_secs,
            at: self.scheduler.wall_now(),
        })
    }

    fn complete(&mut self) -> Option<Event> {
        self.cancel_all();
        self.state = ClockState::Completed;
        let completed_at = self.scheduler.wall_now();
        debug!(total_secs = self.total_secs, "session clock completed");
        Some(Event::SessionCompleted {
            total_duration_secs: self.total_secs,
            protocol_id: self.protocol_id.clone()?,
            started_at: self.started_at.unwrap_or(completed_at),
            completed_at,
        })
    }

    fn rearm_tick(&mut self) {
        if let Some(handle) = self.tick.take() {
            self.scheduler.cancel(handle);
        }
        self.tick = Some(self.scheduler.schedule_repeating(TICK_PERIOD, TimerTask::Tick));
    }

    fn cancel_all(&mut self) {
        if let Some(handle) = self.tick.take() {
            self.scheduler.cancel(handle);
        }
        for handle in self.cues.drain(..) {
            self.scheduler.cancel(handle);
        }
    }

    fn update_event(&self) -> Event {
        Event::TimerUpdate {
            state: self.snapshot(),
            at: self.scheduler.wall_now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualScheduler;
    use proptest::prelude::*;

    fn clock() -> SessionClock<ManualScheduler> {
        SessionClock::new(ManualScheduler::default(), ClockSettings::default())
    }

    fn short(duration: u64, cue_every: u64) -> Protocol {
        Protocol::new("test", "Test", "", duration, cue_every).unwrap()
    }

    /// Advance one second at a time, collecting everything dispatched.
    fn advance(clock: &mut SessionClock<ManualScheduler>, secs: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..secs {
            clock.scheduler_mut().advance(Duration::from_secs(1));
            events.extend(clock.run_due());
        }
        events
    }

    fn cue_offsets(events: &[Event]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::BreathingCue { offset_secs, .. } => Some(*offset_secs),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_emits_zero_progress_update() {
        let mut c = clock();
        let event = c.start(&Protocol::quick()).unwrap();
        let state = event.timer_state().unwrap();
        assert_eq!(state.remaining_seconds, 300);
        assert_eq!(state.total_seconds, 300);
        assert_eq!(state.progress_percent, 0.0);
        assert!(state.running);
        assert!(!state.paused);
        assert_eq!(c.state(), ClockState::Running);
    }

    #[test]
    fn start_only_from_idle() {
        let mut c = clock();
        assert!(c.start(&Protocol::quick()).is_some());
        assert!(c.start(&Protocol::quick()).is_none());
        c.pause();
        assert!(c.start(&Protocol::quick()).is_none());
    }

    #[test]
    fn full_session_completes_once_at_exactly_100() {
        let mut c = clock();
        c.start(&Protocol::quick());
        let events = advance(&mut c, 300);

        let completions: Vec<_> = events.iter().filter(|e| e.is_completion()).collect();
        assert_eq!(completions.len(), 1);
        match completions[0] {
            Event::SessionCompleted {
                total_duration_secs,
                protocol_id,
                ..
            } => {
                assert_eq!(*total_duration_secs, 300);
                assert_eq!(protocol_id, "quick");
            }
            _ => unreachable!(),
        }

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| e.timer_state().map(|s| s.progress_percent))
            .collect();
        assert_eq!(progress.len(), 300);
        assert!(progress.iter().all(|p| *p <= 100.0));
        assert_eq!(progress.last(), Some(&100.0));
        assert_eq!(c.state(), ClockState::Completed);
        assert_eq!(c.scheduler().pending(), 0);

        // Nothing fires after completion.
        assert!(advance(&mut c, 10).is_empty());
    }

    #[test]
    fn quick_protocol_fires_nine_cues() {
        let mut c = clock();
        c.start(&Protocol::quick());
        let events = advance(&mut c, 320);
        assert_eq!(
            cue_offsets(&events),
            vec![30, 60, 90, 120, 150, 180, 210, 240, 270]
        );
    }

    #[test]
    fn cue_dispatched_after_tick_at_same_instant() {
        let mut c = clock();
        c.start(&short(10, 5));
        let events = advance(&mut c, 5);
        let last_two = &events[events.len() - 2..];
        assert!(matches!(last_two[0], Event::TimerUpdate { .. }));
        assert!(matches!(last_two[1], Event::BreathingCue { offset_secs: 5, .. }));
    }

    #[test]
    fn pause_freezes_remaining_and_drops_cues() {
        let mut c = clock();
        c.start(&short(60, 10));
        advance(&mut c, 8);
        let paused = c.pause().unwrap();
        assert!(paused.timer_state().unwrap().paused);

        // The cue at 10s elapses while paused and is dropped.
        let during_pause = advance(&mut c, 5);
        assert!(during_pause.is_empty());
        assert_eq!(c.remaining_secs(), 52);

        let resumed = c.resume().unwrap();
        assert!(!resumed.timer_state().unwrap().paused);
        let after = advance(&mut c, 20);
        assert_eq!(cue_offsets(&after), vec![20, 30]);
        assert_eq!(c.remaining_secs(), 32);
    }

    #[test]
    fn pause_and_resume_guard_state() {
        let mut c = clock();
        assert!(c.pause().is_none());
        assert!(c.resume().is_none());
        c.start(&Protocol::quick());
        assert!(c.resume().is_none());
        assert!(c.pause().is_some());
        assert!(c.pause().is_none());
    }

    #[test]
    fn stop_reports_partial_progress_and_cancels_everything() {
        let mut c = clock();
        c.start(&short(100, 10));
        advance(&mut c, 25);
        let event = c.stop().unwrap();
        let state = event.timer_state().unwrap();
        assert_eq!(state.progress_percent, 25.0);
        assert!(!state.running);
        assert!(!state.paused);
        assert_eq!(c.state(), ClockState::Stopped);
        assert_eq!(c.scheduler().pending(), 0);
        assert!(advance(&mut c, 100).is_empty());
        assert!(c.stop().is_none());
    }

    #[test]
    fn stop_from_paused() {
        let mut c = clock();
        c.start(&short(100, 10));
        c.pause();
        assert!(c.stop().is_some());
        assert_eq!(c.scheduler().pending(), 0);
    }

    #[test]
    fn cues_can_be_disabled() {
        let mut c = SessionClock::new(
            ManualScheduler::default(),
            ClockSettings {
                breathing_cues_enabled: false,
                ..ClockSettings::default()
            },
        );
        c.start(&short(40, 10));
        assert!(cue_offsets(&advance(&mut c, 40)).is_empty());
    }

    #[test]
    fn short_hidden_interval_is_corrected() {
        let mut c = clock();
        c.start(&Protocol::quick());
        advance(&mut c, 10);
        assert_eq!(c.remaining_secs(), 290);

        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(5));
        let event = c.on_visibility_change(false).unwrap();
        assert_eq!(event.timer_state().unwrap().remaining_seconds, 285);
        assert_eq!(c.remaining_secs(), 285);

        // Overdue ticks are not replayed; the next one lands a second later.
        assert!(c.run_due().is_empty());
        advance(&mut c, 1);
        assert_eq!(c.remaining_secs(), 284);
    }

    #[test]
    fn long_hidden_interval_is_not_corrected() {
        let mut c = clock();
        c.start(&Protocol::quick());
        advance(&mut c, 10);

        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(15));
        assert!(c.on_visibility_change(false).is_none());
        assert_eq!(c.remaining_secs(), 290);
        assert!(c.run_due().is_empty());
    }

    #[test]
    fn hidden_while_paused_is_not_corrected() {
        let mut c = clock();
        c.start(&Protocol::quick());
        c.pause();
        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(5));
        assert!(c.on_visibility_change(false).is_none());
        assert_eq!(c.remaining_secs(), 300);
    }

    #[test]
    fn paused_time_while_hidden_is_not_corrected() {
        let mut c = clock();
        c.start(&Protocol::quick());
        c.on_visibility_change(true);
        c.pause();
        c.scheduler_mut().advance(Duration::from_secs(5));
        c.resume();
        assert!(c.on_visibility_change(false).is_none());
        assert_eq!(c.remaining_secs(), 300);
    }

    #[test]
    fn only_running_time_while_hidden_is_corrected() {
        let mut c = clock();
        c.start(&Protocol::quick());
        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(2));
        c.pause();
        c.scheduler_mut().advance(Duration::from_secs(20));
        c.resume();
        c.scheduler_mut().advance(Duration::from_secs(3));
        let event = c.on_visibility_change(false).unwrap();
        assert_eq!(event.timer_state().unwrap().remaining_seconds, 295);
    }

    #[test]
    fn hidden_while_paused_counts_from_resume() {
        let mut c = clock();
        c.start(&Protocol::quick());
        c.pause();
        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(30));
        c.resume();
        c.scheduler_mut().advance(Duration::from_secs(4));
        c.on_visibility_change(false);
        assert_eq!(c.remaining_secs(), 296);
    }

    #[test]
    fn drift_limit_is_tunable() {
        let mut c = clock();
        c.set_drift_correction_limit(Duration::from_secs(30));
        c.start(&Protocol::quick());
        c.on_visibility_change(true);
        c.scheduler_mut().advance(Duration::from_secs(15));
        assert!(c.on_visibility_change(false).is_some());
        assert_eq!(c.remaining_secs(), 285);
    }

    #[test]
    fn teardown_is_safe_from_any_state() {
        let mut c = clock();
        c.teardown();
        assert_eq!(c.state(), ClockState::Idle);

        c.start(&Protocol::quick());
        c.teardown();
        assert_eq!(c.state(), ClockState::Stopped);
        assert_eq!(c.scheduler().pending(), 0);
        c.teardown();
    }

    #[test]
    fn reset_allows_a_new_session() {
        let mut c = clock();
        c.start(&short(2, 1));
        advance(&mut c, 2);
        assert_eq!(c.state(), ClockState::Completed);
        assert!(c.reset());
        assert_eq!(c.state(), ClockState::Idle);
        assert!(c.start(&short(3, 1)).is_some());
        assert!(!c.reset());
    }

    proptest! {
        #[test]
        fn pause_resume_preserves_remaining(
            duration in 2u64..600,
            run_before in 0u64..600,
            ticks_while_paused in 0u64..50,
        ) {
            let run_before = run_before % duration;
            let mut c = clock();
            c.start(&short(duration, 7));
            advance(&mut c, run_before);

            let before = c.remaining_secs();
            c.pause();
            advance(&mut c, ticks_while_paused);
            c.resume();
            prop_assert_eq!(c.remaining_secs(), before);
        }

        #[test]
        fn progress_is_monotonic_and_bounded(duration in 1u64..400) {
            let mut c = clock();
            c.start(&short(duration, 13));
            let events = advance(&mut c, duration + 5);
            let mut last = 0.0;
            for p in events.iter().filter_map(|e| e.timer_state().map(|s| s.progress_percent)) {
                prop_assert!(p >= last);
                prop_assert!(p <= 100.0);
                last = p;
            }
            prop_assert_eq!(last, 100.0);
            prop_assert_eq!(events.iter().filter(|e| e.is_completion()).count(), 1);
        }
    }
}
