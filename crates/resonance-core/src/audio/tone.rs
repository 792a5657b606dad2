//! Continuous reference tone.

use std::time::Duration;

use tracing::{debug, warn};

use super::device::{AudioBackend, AudioDevice, PowerState};
use crate::error::AudioError;

/// Fixed tone frequency. Not user-configurable.
pub const REFERENCE_FREQUENCY_HZ: f32 = 130.0;
pub const DEFAULT_VOLUME: f32 = 0.3;
/// Duration of the gain ramp applied on volume changes while playing.
pub const VOLUME_RAMP: Duration = Duration::from_millis(100);
/// Exponential ramps cannot reach zero; this stands in for silence.
pub const MIN_RAMP_GAIN: f32 = 0.001;

/// Plays a steady sine tone through a lazily opened device.
///
/// Failures are reported once through the returned `Result`; nothing is
/// retried and nothing here can stop a running session clock.
pub struct ToneGenerator<B: AudioBackend> {
    backend: B,
    device: Option<B::Device>,
    playing: bool,
    volume: f32,
    suspended_while_hidden: bool,
    closed: bool,
}

impl<B: AudioBackend> ToneGenerator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            device: None,
            playing: false,
            volume: DEFAULT_VOLUME,
            suspended_while_hidden: false,
            closed: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn frequency_hz(&self) -> f32 {
        REFERENCE_FREQUENCY_HZ
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Open the device if needed, resuming it if it starts suspended.
    pub fn initialize(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Closed);
        }
        if self.device.is_some() {
            return Ok(());
        }
        let mut device = self.backend.open().inspect_err(|err| {
            warn!(error = %err, "audio initialization failed");
        })?;
        if device.power_state() == PowerState::Suspended {
            device.resume().map_err(|err| {
                warn!(error = %err, "audio device could not leave suspended state");
                AudioError::StartFailed(err.to_string())
            })?;
        }
        self.device = Some(device);
        Ok(())
    }

    /// Start (or restart) the tone at the current volume.
    pub fn start(&mut self) -> Result<(), AudioError> {
        self.initialize()?;
        self.stop();

        let gain = self.volume;
        let device = self.device.as_mut().ok_or(AudioError::Closed)?;
        if device.power_state() == PowerState::Suspended {
            device
                .resume()
                .map_err(|err| AudioError::StartFailed(err.to_string()))?;
            self.suspended_while_hidden = false;
        }
        device
            .start_sine(REFERENCE_FREQUENCY_HZ, gain)
            .inspect_err(|err| warn!(error = %err, "audio start failed"))?;
        self.playing = true;
        debug!(frequency_hz = REFERENCE_FREQUENCY_HZ, gain, "tone started");
        Ok(())
    }

    /// Halt playback. No-op when nothing is playing.
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        if let Some(device) = self.device.as_mut() {
            if let Err(err) = device.stop_sine() {
                warn!(error = %err, "tone stop reported an error");
            }
        }
        self.playing = false;
        debug!("tone stopped");
    }

    /// Clamp to `[0, 1]`; ramps smoothly if the tone is playing.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        if !self.playing {
            return;
        }
        if let Some(device) = self.device.as_mut() {
            device.ramp_gain(self.volume.max(MIN_RAMP_GAIN), VOLUME_RAMP);
        }
    }

    /// Suspend the device while the host surface is hidden.
    pub fn on_visibility_change(&mut self, hidden: bool) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        match (hidden, device.power_state()) {
            (true, PowerState::Running) => match device.suspend() {
                Ok(()) => self.suspended_while_hidden = true,
                Err(err) => warn!(error = %err, "audio suspend failed"),
            },
            (false, PowerState::Suspended) if self.suspended_while_hidden => {
                match device.resume() {
                    Ok(()) => self.suspended_while_hidden = false,
                    Err(err) => warn!(error = %err, "audio resume failed"),
                }
            }
            _ => {}
        }
    }

    /// Stop and release the device for good. Later calls are no-ops.
    pub fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.stop();
        if let Some(mut device) = self.device.take() {
            if let Err(err) = device.close() {
                warn!(error = %err, "audio device close failed");
            }
        }
        self.closed = true;
    }
}

impl<B: AudioBackend> Drop for ToneGenerator<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
