//! Tone generator and audio device seam.
//!
//! The [`ToneGenerator`] is the only owner of the audio device. Backends
//! implement [`AudioBackend`]; the default build ships [`NullBackend`],
//! which reports the host as unsupported so sessions run silently.

mod device;
#[cfg(test)]
pub(crate) mod fake;
#[cfg(any(feature = "rodio", test))]
mod ramp;
#[cfg(feature = "rodio")]
mod rodio_backend;
mod tone;

pub use device::{AudioBackend, AudioDevice, NullBackend, NullDevice, PowerState};
#[cfg(feature = "rodio")]
pub use rodio_backend::{RodioBackend, RodioDevice};
pub use tone::{ToneGenerator, DEFAULT_VOLUME, MIN_RAMP_GAIN, REFERENCE_FREQUENCY_HZ, VOLUME_RAMP};
