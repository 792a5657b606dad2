//! Audio output through rodio's default output stream.

use std::sync::Arc;
use std::time::Duration;

use rodio::source::SineWave;
use rodio::{OutputStream, OutputStreamHandle, Sink};

use super::device::{AudioBackend, AudioDevice, PowerState};
use super::ramp::{ramp_gain_at, RampGeneration, RAMP_STEPS};
use crate::error::AudioError;

/// Opens the host's default output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct RodioBackend;

/// An open rodio output stream with at most one sine voice.
pub struct RodioDevice {
    // Dropping the stream closes the device.
    stream: Option<OutputStream>,
    handle: OutputStreamHandle,
    sink: Option<Arc<Sink>>,
    ramp: RampGeneration,
    state: PowerState,
}

impl AudioBackend for RodioBackend {
    type Device = RodioDevice;

    fn open(&mut self) -> Result<RodioDevice, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::Unsupported(e.to_string()))?;
        Ok(RodioDevice {
            stream: Some(stream),
            handle,
            sink: None,
            ramp: RampGeneration::default(),
            state: PowerState::Running,
        })
    }
}

impl AudioDevice for RodioDevice {
    fn power_state(&self) -> PowerState {
        self.state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.state == PowerState::Closed {
            return Err(AudioError::Closed);
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        self.state = PowerState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        if self.state == PowerState::Closed {
            return Err(AudioError::Closed);
        }
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.state = PowerState::Suspended;
        Ok(())
    }

    fn start_sine(&mut self, frequency_hz: f32, gain: f32) -> Result<(), AudioError> {
        if self.state == PowerState::Closed {
            return Err(AudioError::Closed);
        }
        self.ramp.cancel();
        let sink =
            Sink::try_new(&self.handle).map_err(|e| AudioError::StartFailed(e.to_string()))?;
        sink.set_volume(gain);
        sink.append(SineWave::new(frequency_hz));
        if self.state == PowerState::Suspended {
            sink.pause();
        }
        self.sink = Some(Arc::new(sink));
        Ok(())
    }

    fn stop_sine(&mut self) -> Result<(), AudioError> {
        self.ramp.cancel();
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        Ok(())
    }

    fn ramp_gain(&mut self, target: f32, over: Duration) {
        let Some(sink) = self.sink.as_ref().map(Arc::clone) else {
            return;
        };
        // Starting a ramp stops the previous one, so `from` is the gain it
        // last set.
        let token = self.ramp.begin();
        let generation = self.ramp.clone();
        let from = sink.volume().max(super::MIN_RAMP_GAIN);
        let target = target.max(super::MIN_RAMP_GAIN);
        let step = over / RAMP_STEPS;
        // Sink has no automation; step the gain geometrically off-thread.
        std::thread::spawn(move || {
            for i in 1..=RAMP_STEPS {
                std::thread::sleep(step);
                if !generation.is_current(token) {
                    return;
                }
                sink.set_volume(ramp_gain_at(from, target, i));
            }
        });
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.stop_sine()?;
        self.stream = None;
        self.state = PowerState::Closed;
        Ok(())
    }
}
