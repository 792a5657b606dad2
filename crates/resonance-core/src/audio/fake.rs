//! In-memory audio backend that records every device call.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use super::device::{AudioBackend, AudioDevice, PowerState};
use crate::error::AudioError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceCall {
    Open,
    Resume,
    Suspend,
    StartSine { frequency_hz: f32, gain: f32 },
    StopSine,
    Ramp { target: f32, over: Duration },
    Close,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeBackend {
    calls: Rc<RefCell<Vec<DeviceCall>>>,
    start_suspended: bool,
    unsupported: bool,
    fail_start: bool,
}

impl FakeBackend {
    /// Devices open in the suspended power state.
    pub fn suspended() -> Self {
        Self {
            start_suspended: true,
            ..Self::default()
        }
    }

    /// Opening a device fails as on a host without audio output.
    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// Devices open but refuse to start the sine voice.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, call: &DeviceCall) -> usize {
        self.calls.borrow().iter().filter(|c| *c == call).count()
    }
}

#[derive(Debug)]
pub(crate) struct FakeDevice {
    calls: Rc<RefCell<Vec<DeviceCall>>>,
    state: PowerState,
    fail_start: bool,
}

impl AudioBackend for FakeBackend {
    type Device = FakeDevice;

    fn open(&mut self) -> Result<FakeDevice, AudioError> {
        if self.unsupported {
            return Err(AudioError::Unsupported("fake host has no audio".into()));
        }
        self.calls.borrow_mut().push(DeviceCall::Open);
        Ok(FakeDevice {
            calls: Rc::clone(&self.calls),
            state: if self.start_suspended {
                PowerState::Suspended
            } else {
                PowerState::Running
            },
            fail_start: self.fail_start,
        })
    }
}

impl AudioDevice for FakeDevice {
    fn power_state(&self) -> PowerState {
        self.state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.calls.borrow_mut().push(DeviceCall::Resume);
        self.state = PowerState::Running;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.calls.borrow_mut().push(DeviceCall::Suspend);
        self.state = PowerState::Suspended;
        Ok(())
    }

    fn start_sine(&mut self, frequency_hz: f32, gain: f32) -> Result<(), AudioError> {
        if self.fail_start {
            return Err(AudioError::StartFailed("fake device refused".into()));
        }
        self.calls
            .borrow_mut()
            .push(DeviceCall::StartSine { frequency_hz, gain });
        Ok(())
    }

    fn stop_sine(&mut self) -> Result<(), AudioError> {
        self.calls.borrow_mut().push(DeviceCall::StopSine);
        Ok(())
    }

    fn ramp_gain(&mut self, target: f32, over: Duration) {
        self.calls.borrow_mut().push(DeviceCall::Ramp { target, over });
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.calls.borrow_mut().push(DeviceCall::Close);
        self.state = PowerState::Closed;
        Ok(())
    }
}
