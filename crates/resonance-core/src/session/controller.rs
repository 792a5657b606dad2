use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::audio::{AudioBackend, ToneGenerator};
use crate::error::{AudioError, RecorderError};
use crate::events::Event;
use crate::protocol::Protocol;
use crate::recorder::{SessionRecord, SessionRecorder, SettingsPatch};
use crate::storage::KeyValueStore;
use crate::time::{SystemClock, WallClock};
use crate::timer::{ClockState, Scheduler, SessionClock, TimerState};

/// Commands from the embedding surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostSignal {
    Pause,
    Resume,
    Stop,
    /// The host surface was hidden (`true`) or shown again (`false`).
    Visibility { hidden: bool },
    SetVolume(f32),
    SetBreathingCues(bool),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub protocol_id: String,
    pub completed: bool,
    pub elapsed_secs: u64,
    /// Persisted record, if recording succeeded and anything was practised.
    pub record: Option<SessionRecord>,
}

/// Runs one session at a time over a clock, an optional tone and a recorder.
pub struct SessionController<S, B, K, C = SystemClock>
where
    S: Scheduler,
    B: AudioBackend,
    K: KeyValueStore,
    C: WallClock,
{
    clock: SessionClock<S>,
    tone: Option<ToneGenerator<B>>,
    recorder: SessionRecorder<K, C>,
    audio_reported: bool,
    outcome: Option<SessionOutcome>,
}

impl<S, B, K, C> SessionController<S, B, K, C>
where
    S: Scheduler,
    B: AudioBackend,
    K: KeyValueStore,
    C: WallClock,
{
    /// Pass `tone: None` to run silently. Stored settings seed the volume
    /// and the breathing-cue switch.
    pub fn new(
        mut clock: SessionClock<S>,
        mut tone: Option<ToneGenerator<B>>,
        recorder: SessionRecorder<K, C>,
    ) -> Self {
        let settings = recorder.settings();
        clock.set_breathing_cues_enabled(settings.breathing_cues_enabled);
        if let Some(tone) = tone.as_mut() {
            tone.set_volume(settings.volume);
        }
        Self {
            clock,
            tone,
            recorder,
            audio_reported: false,
            outcome: None,
        }
    }

    pub fn clock(&self) -> &SessionClock<S> {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock<S> {
        &mut self.clock
    }

    pub fn tone(&self) -> Option<&ToneGenerator<B>> {
        self.tone.as_ref()
    }

    pub fn recorder(&self) -> &SessionRecorder<K, C> {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut SessionRecorder<K, C> {
        &mut self.recorder
    }

    pub fn snapshot(&self) -> TimerState {
        self.clock.snapshot()
    }

    /// Set once the current session has completed or been stopped.
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Start the tone, then the clock. A finished previous session is
    /// cleared first; an active one makes this a no-op.
    pub fn start(&mut self, protocol: &Protocol) -> Vec<Event> {
        if self.clock.state().is_active() {
            return Vec::new();
        }
        if self.clock.state() != ClockState::Idle {
            self.clock.reset();
        }
        self.outcome = None;
        self.audio_reported = false;

        let mut events = Vec::new();
        self.start_tone(&mut events);
        match self.clock.start(protocol) {
            Some(event) => events.push(event),
            None => self.stop_tone(),
        }
        events
    }

    pub fn pause(&mut self) -> Vec<Event> {
        let Some(event) = self.clock.pause() else {
            return Vec::new();
        };
        self.stop_tone();
        vec![event]
    }

    pub fn resume(&mut self) -> Vec<Event> {
        if self.clock.state() != ClockState::Paused {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.start_tone(&mut events);
        events.extend(self.clock.resume());
        events
    }

    /// End the session early, recording it if any time was practised.
    pub fn stop(&mut self) -> Vec<Event> {
        let elapsed_secs = self.clock.elapsed_secs();
        let Some(event) = self.clock.stop() else {
            return Vec::new();
        };
        self.stop_tone();
        let mut events = vec![event];

        let protocol_id = self.clock.protocol_id().unwrap_or_default().to_string();
        let record = if elapsed_secs > 0 {
            let started_at = self.clock.started_at().unwrap_or_else(|| self.now());
            let result = self.recorder.record_stopped_session(
                &protocol_id,
                self.clock.total_secs(),
                elapsed_secs,
                started_at,
            );
            self.recorded(result, &mut events)
        } else {
            None
        };

        self.outcome = Some(SessionOutcome {
            protocol_id,
            completed: false,
            elapsed_secs,
            record,
        });
        events
    }

    /// Change the tone volume and persist it as a preference.
    pub fn set_volume(&mut self, volume: f32) -> Vec<Event> {
        if let Some(tone) = self.tone.as_mut() {
            tone.set_volume(volume);
        }
        self.save_settings(SettingsPatch {
            volume: Some(volume),
            ..SettingsPatch::default()
        })
    }

    pub fn set_breathing_cues_enabled(&mut self, enabled: bool) -> Vec<Event> {
        self.clock.set_breathing_cues_enabled(enabled);
        self.save_settings(SettingsPatch {
            breathing_cues_enabled: Some(enabled),
            ..SettingsPatch::default()
        })
    }

    pub fn on_visibility_change(&mut self, hidden: bool) -> Vec<Event> {
        if let Some(tone) = self.tone.as_mut() {
            tone.on_visibility_change(hidden);
        }
        self.clock.on_visibility_change(hidden).into_iter().collect()
    }

    pub fn apply_signal(&mut self, signal: HostSignal) -> Vec<Event> {
        match signal {
            HostSignal::Pause => self.pause(),
            HostSignal::Resume => self.resume(),
            HostSignal::Stop => self.stop(),
            HostSignal::Visibility { hidden } => self.on_visibility_change(hidden),
            HostSignal::SetVolume(volume) => self.set_volume(volume),
            HostSignal::SetBreathingCues(enabled) => self.set_breathing_cues_enabled(enabled),
        }
    }

    /// Dispatch due clock tasks, recording the session on completion.
    pub fn run_due(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        for event in self.clock.run_due() {
            let completion = match &event {
                Event::SessionCompleted {
                    total_duration_secs,
                    protocol_id,
                    started_at,
                    completed_at,
                } => Some((*total_duration_secs, protocol_id.clone(), *started_at, *completed_at)),
                _ => None,
            };
            events.push(event);
            if let Some((total, protocol_id, started_at, completed_at)) = completion {
                self.finish(total, protocol_id, started_at, completed_at, &mut events);
            }
        }
        events
    }

    /// Cancel everything and release the audio device.
    pub fn teardown(&mut self) {
        self.clock.teardown();
        if let Some(tone) = self.tone.as_mut() {
            tone.teardown();
        }
    }

    fn finish(
        &mut self,
        total_secs: u64,
        protocol_id: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        events: &mut Vec<Event>,
    ) {
        self.stop_tone();
        let result = self.recorder.record_completed_session(
            &protocol_id,
            total_secs,
            total_secs,
            started_at,
            completed_at,
        );
        let record = self.recorded(result, events);
        self.outcome = Some(SessionOutcome {
            protocol_id,
            completed: true,
            elapsed_secs: total_secs,
            record,
        });
    }

    fn recorded(
        &mut self,
        result: Result<SessionRecord, RecorderError>,
        events: &mut Vec<Event>,
    ) -> Option<SessionRecord> {
        match result {
            Ok(record) => {
                events.push(Event::SessionRecorded {
                    record_id: record.id.clone(),
                    completed: record.completed,
                    at: self.now(),
                });
                Some(record)
            }
            Err(err) => {
                warn!(error = %err, "session outcome not persisted");
                events.push(Event::StorageFailed {
                    message: err.to_string(),
                    at: self.now(),
                });
                None
            }
        }
    }

    fn save_settings(&mut self, patch: SettingsPatch) -> Vec<Event> {
        match self.recorder.save_settings(patch) {
            Ok(_) => Vec::new(),
            Err(err) => {
                warn!(error = %err, "settings not persisted");
                vec![Event::StorageFailed {
                    message: err.to_string(),
                    at: self.now(),
                }]
            }
        }
    }

    fn start_tone(&mut self, events: &mut Vec<Event>) {
        let Some(tone) = self.tone.as_mut() else {
            return;
        };
        if let Err(err) = tone.start() {
            self.report_audio(err, events);
        }
    }

    fn stop_tone(&mut self) {
        if let Some(tone) = self.tone.as_mut() {
            tone.stop();
        }
    }

    fn report_audio(&mut self, err: AudioError, events: &mut Vec<Event>) {
        if self.audio_reported {
            return;
        }
        self.audio_reported = true;
        debug!(error = %err, "continuing without tone");
        events.push(Event::AudioUnavailable {
            reason: err.to_string(),
            at: self.now(),
        });
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.scheduler().wall_now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::{DeviceCall, FakeBackend};
    use crate::audio::NullBackend;
    use crate::recorder::{Settings, SETTINGS_KEY};
    use crate::storage::MemoryStore;
    use crate::time::FixedClock;
    use crate::timer::{ClockSettings, ManualScheduler};
    use chrono::TimeZone;
    use std::time::Duration;

    type Controller<B> = SessionController<ManualScheduler, B, MemoryStore, FixedClock>;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 8, 0, 0).unwrap()
    }

    fn controller_with<B: AudioBackend>(backend: B, store: MemoryStore) -> Controller<B> {
        let clock = SessionClock::new(ManualScheduler::new(origin()), ClockSettings::default());
        let recorder = SessionRecorder::with_clock(store, FixedClock::new(origin()));
        SessionController::new(clock, Some(ToneGenerator::new(backend)), recorder)
    }

    fn short() -> Protocol {
        Protocol::new("short", "Short", "", 6, 2).unwrap()
    }

    fn advance<B: AudioBackend>(controller: &mut Controller<B>, secs: u64) -> Vec<Event> {
        let mut events = Vec::new();
        for _ in 0..secs {
            controller
                .clock_mut()
                .scheduler_mut()
                .advance(Duration::from_secs(1));
            events.extend(controller.run_due());
        }
        events
    }

    #[test]
    fn completion_stops_tone_and_records() {
        let backend = FakeBackend::default();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        c.start(&short());
        assert!(c.tone().unwrap().is_playing());

        let events = advance(&mut c, 6);
        let completion = events.iter().position(Event::is_completion).unwrap();
        assert!(matches!(
            events[completion + 1],
            Event::SessionRecorded { completed: true, .. }
        ));
        assert!(!c.tone().unwrap().is_playing());
        assert_eq!(backend.count(&DeviceCall::StopSine), 1);

        let outcome = c.outcome().unwrap();
        assert!(outcome.completed);
        assert_eq!(outcome.elapsed_secs, 6);
        assert_eq!(c.recorder().sessions().len(), 1);
        assert_eq!(c.recorder().streak().current_streak, 1);
    }

    #[test]
    fn pause_and_resume_follow_the_clock() {
        let backend = FakeBackend::default();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        c.start(&short());
        advance(&mut c, 2);
        assert_eq!(c.pause().len(), 1);
        assert!(!c.tone().unwrap().is_playing());
        advance(&mut c, 3);
        assert_eq!(c.snapshot().remaining_seconds, 4);

        assert_eq!(c.resume().len(), 1);
        assert!(c.tone().unwrap().is_playing());
        assert!(c.resume().is_empty());
        assert_eq!(
            backend
                .calls()
                .iter()
                .filter(|call| matches!(call, DeviceCall::StartSine { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn stop_records_incomplete_session() {
        let mut c = controller_with(FakeBackend::default(), MemoryStore::new());
        c.start(&short());
        advance(&mut c, 3);
        let events = c.stop();
        assert!(matches!(events[1], Event::SessionRecorded { completed: false, .. }));
        let outcome = c.outcome().unwrap();
        assert!(!outcome.completed);
        assert_eq!(outcome.elapsed_secs, 3);
        let sessions = c.recorder().sessions();
        let stored = &sessions[0];
        assert_eq!(stored.completed_duration_secs, 3);
        assert_eq!(stored.requested_duration_secs, 6);
        assert_eq!(c.recorder().streak().current_streak, 0);
        assert_eq!(c.clock().scheduler().pending(), 0);
    }

    #[test]
    fn immediate_stop_records_nothing() {
        let mut c = controller_with(FakeBackend::default(), MemoryStore::new());
        c.start(&short());
        assert_eq!(c.stop().len(), 1);
        assert!(c.outcome().unwrap().record.is_none());
        assert!(c.recorder().sessions().is_empty());
    }

    #[test]
    fn missing_audio_is_reported_once_and_session_runs() {
        let mut c = controller_with(NullBackend, MemoryStore::new());
        let events = c.start(&short());
        assert!(matches!(events[0], Event::AudioUnavailable { .. }));
        assert!(events[1].timer_state().is_some());

        advance(&mut c, 1);
        c.pause();
        assert!(c.resume().iter().all(|e| !matches!(e, Event::AudioUnavailable { .. })));
        assert!(advance(&mut c, 5).iter().any(Event::is_completion));
    }

    #[test]
    fn host_without_audio_output_runs_silently() {
        let backend = FakeBackend::unsupported();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        let events = c.start(&short());
        assert!(matches!(events[0], Event::AudioUnavailable { .. }));
        assert!(backend.calls().is_empty());
        assert!(!c.tone().unwrap().is_playing());
        assert!(advance(&mut c, 6).iter().any(Event::is_completion));
        assert!(c.outcome().unwrap().record.is_some());
    }

    #[test]
    fn streak_write_failure_still_reports_recorded_session() {
        let mut sized = controller_with(FakeBackend::default(), MemoryStore::new());
        sized.start(&short());
        advance(&mut sized, 6);
        let needed = sized.recorder().store().used_bytes();

        let mut c = controller_with(FakeBackend::default(), MemoryStore::with_capacity_bytes(needed - 1));
        c.start(&short());
        let events = advance(&mut c, 6);
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::SessionRecorded { completed: true, .. })));
        let record = c.outcome().unwrap().record.clone().unwrap();
        assert_eq!(c.recorder().sessions()[0].id, record.id);
        assert_eq!(c.recorder().streak().current_streak, 0);
    }

    #[test]
    fn storage_failure_does_not_block_completion() {
        let mut c = controller_with(FakeBackend::default(), MemoryStore::with_capacity_bytes(8));
        c.start(&short());
        let events = advance(&mut c, 6);
        let completion = events.iter().position(Event::is_completion).unwrap();
        assert!(matches!(events[completion + 1], Event::StorageFailed { .. }));
        assert!(c.outcome().unwrap().completed);
        assert!(c.outcome().unwrap().record.is_none());
    }

    #[test]
    fn stored_settings_seed_tone_and_cues() {
        let mut store = MemoryStore::new();
        let settings = Settings {
            volume: 0.6,
            breathing_cues_enabled: false,
            ..Settings::default()
        };
        store
            .set(SETTINGS_KEY, &serde_json::to_string(&settings).unwrap())
            .unwrap();
        let mut c = controller_with(FakeBackend::default(), store);
        assert_eq!(c.tone().unwrap().volume(), 0.6);
        c.start(&short());
        let events = advance(&mut c, 6);
        assert!(!events.iter().any(|e| matches!(e, Event::BreathingCue { .. })));
    }

    #[test]
    fn volume_changes_ramp_and_persist() {
        let backend = FakeBackend::default();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        c.start(&short());
        assert!(c.set_volume(0.9).is_empty());
        assert_eq!(c.recorder().settings().volume, 0.9);
        assert!(backend
            .calls()
            .iter()
            .any(|call| matches!(call, DeviceCall::Ramp { .. })));
    }

    #[test]
    fn signals_map_to_operations() {
        let mut c = controller_with(FakeBackend::default(), MemoryStore::new());
        c.start(&short());
        c.apply_signal(HostSignal::SetBreathingCues(false));
        assert!(!c.recorder().settings().breathing_cues_enabled);
        assert_eq!(c.apply_signal(HostSignal::Pause).len(), 1);
        assert_eq!(c.clock().state(), ClockState::Paused);
        c.apply_signal(HostSignal::Stop);
        assert_eq!(c.clock().state(), ClockState::Stopped);
    }

    #[test]
    fn hidden_interval_suspends_tone_and_corrects_drift() {
        let backend = FakeBackend::default();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        c.start(&Protocol::quick());
        c.on_visibility_change(true);
        c.clock_mut().scheduler_mut().advance(Duration::from_secs(5));
        let events = c.on_visibility_change(false);
        assert_eq!(events.len(), 1);
        assert_eq!(c.snapshot().remaining_seconds, 295);
        assert_eq!(backend.count(&DeviceCall::Suspend), 1);
        assert_eq!(backend.count(&DeviceCall::Resume), 1);
    }

    #[test]
    fn new_session_after_completion() {
        let mut c = controller_with(FakeBackend::default(), MemoryStore::new());
        c.start(&short());
        advance(&mut c, 6);
        assert!(!c.start(&short()).is_empty());
        assert!(c.outcome().is_none());
        assert!(c.start(&short()).is_empty());
    }

    #[test]
    fn teardown_releases_device() {
        let backend = FakeBackend::default();
        let mut c = controller_with(backend.clone(), MemoryStore::new());
        c.start(&short());
        c.teardown();
        assert_eq!(c.clock().scheduler().pending(), 0);
        assert!(c.tone().unwrap().is_closed());
        assert_eq!(backend.count(&DeviceCall::Close), 1);
    }
}
