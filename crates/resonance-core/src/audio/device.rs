use std::time::Duration;

use crate::error::AudioError;

/// Power state of an output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Running,
    /// Output halted to save resources; can be resumed.
    Suspended,
    Closed,
}

/// An opened audio output able to play one sine voice.
pub trait AudioDevice {
    fn power_state(&self) -> PowerState;

    fn resume(&mut self) -> Result<(), AudioError>;

    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Start a continuous sine voice, replacing nothing: the caller stops
    /// any previous voice first.
    fn start_sine(&mut self, frequency_hz: f32, gain: f32) -> Result<(), AudioError>;

    fn stop_sine(&mut self) -> Result<(), AudioError>;

    /// Exponential gain ramp. `target` must be strictly positive.
    fn ramp_gain(&mut self, target: f32, over: Duration);

    /// Release the device. It cannot be reopened.
    fn close(&mut self) -> Result<(), AudioError>;
}

/// Opens audio devices on the host.
pub trait AudioBackend {
    type Device: AudioDevice;

    fn open(&mut self) -> Result<Self::Device, AudioError>;
}

/// Backend for hosts without audio output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

/// Uninhabited: [`NullBackend`] never opens a device.
#[derive(Debug)]
pub enum NullDevice {}

impl AudioBackend for NullBackend {
    type Device = NullDevice;

    fn open(&mut self) -> Result<NullDevice, AudioError> {
        Err(AudioError::Unsupported(
            "no audio output backend is available".into(),
        ))
    }
}

impl AudioDevice for NullDevice {
    fn power_state(&self) -> PowerState {
        match *self {}
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        match *self {}
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        match *self {}
    }

    fn start_sine(&mut self, _frequency_hz: f32, _gain: f32) -> Result<(), AudioError> {
        match *self {}
    }

    fn stop_sine(&mut self) -> Result<(), AudioError> {
        match *self {}
    }

    fn ramp_gain(&mut self, _target: f32, _over: Duration) {
        match *self {}
    }

    fn close(&mut self) -> Result<(), AudioError> {
        match *self {}
    }
}
