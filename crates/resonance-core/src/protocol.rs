//! Practice protocol catalog.
//!
//! Protocols are static: the catalog is compiled in and users only pick one.

use serde::Serialize;

use crate::error::ValidationError;

/// Id of the short daily practice.
pub const QUICK_PROTOCOL_ID: &str = "quick";
/// Id of the long practice.
pub const INTENSIVE_PROTOCOL_ID: &str = "intensive";

/// A named, fixed-duration practice configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    id: String,
    name: String,
    description: String,
    duration_seconds: u64,
    breathing_cue_interval_seconds: u64,
}

impl Protocol {
    /// Build a protocol, rejecting zero durations or cue intervals.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        duration_seconds: u64,
        breathing_cue_interval_seconds: u64,
    ) -> Result<Self, ValidationError> {
        if duration_seconds == 0 {
            return Err(ValidationError::InvalidValue {
                field: "durationSeconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        if breathing_cue_interval_seconds == 0 {
            return Err(ValidationError::InvalidValue {
                field: "breathingCueIntervalSeconds".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            duration_seconds,
            breathing_cue_interval_seconds,
        })
    }

    /// 5 minutes, cue every 30 seconds.
    pub fn quick() -> Self {
        Self {
            id: QUICK_PROTOCOL_ID.into(),
            name: "Quick Practice".into(),
            description: "Five minutes of guided humming, a daily practice".into(),
            duration_seconds: 5 * 60,
            breathing_cue_interval_seconds: 30,
        }
    }

    /// 60 minutes, cue every 2 minutes.
    pub fn intensive() -> Self {
        Self {
            id: INTENSIVE_PROTOCOL_ID.into(),
            name: "Intensive Protocol".into(),
            description: "Sixty minutes of continuous humming for sustained relief".into(),
            duration_seconds: 60 * 60,
            breathing_cue_interval_seconds: 120,
        }
    }

    /// The full reference catalog, shortest first.
    pub fn catalog() -> Vec<Protocol> {
        vec![Self::quick(), Self::intensive()]
    }

    /// Look up a catalog protocol by id.
    pub fn find(id: &str) -> Result<Protocol, ValidationError> {
        Self::catalog()
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ValidationError::UnknownProtocol(id.to_string()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn breathing_cue_interval_seconds(&self) -> u64 {
        self.breathing_cue_interval_seconds
    }

    /// Offsets (seconds from start) at which breathing cues fire.
    ///
    /// Never includes the nominal end of the session.
    pub fn cue_offsets(&self) -> Vec<u64> {
        (1..)
            .map(|k| k * self.breathing_cue_interval_seconds)
            .take_while(|offset| *offset < self.duration_seconds)
            .collect()
    }
}
