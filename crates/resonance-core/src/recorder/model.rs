use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_VOLUME;
use crate::error::ValidationError;
use crate::protocol::QUICK_PROTOCOL_ID;

/// One finished or stopped session. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub protocol_id: String,
    pub started_at: DateTime<Utc>,
    /// `None` for sessions ended by an explicit stop.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(rename = "requestedDurationSeconds")]
    pub requested_duration_secs: u64,
    #[serde(rename = "completedDurationSeconds")]
    pub completed_duration_secs: u64,
    pub completed: bool,
}

impl SessionRecord {
    /// When the session ended: completion time, or start plus time practised.
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or_else(|| {
            let practised = i64::try_from(self.completed_duration_secs).unwrap_or(i64::MAX);
            self.started_at
                .checked_add_signed(chrono::Duration::seconds(practised))
                .unwrap_or(self.started_at)
        })
    }
}

/// Running summary of consecutive practice days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub last_practice_day: Option<NaiveDate>,
}

impl StreakState {
    /// Count `day` as practised. Returns true if the streak changed.
    ///
    /// Days on or before the last practice day change nothing.
    pub fn register_practice_day(&mut self, day: NaiveDate) -> bool {
        match self.last_practice_day {
            Some(last) if day <= last => return false,
            Some(last) if last.succ_opt() == Some(day) => {
                self.current_streak = self.current_streak.saturating_add(1);
            }
            _ => self.current_streak = 1,
        }
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_practice_day = Some(day);
        true
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.longest_streak < self.current_streak {
            return Err(ValidationError::InvalidValue {
                field: "longestStreak".into(),
                message: format!(
                    "{} is below currentStreak {}",
                    self.longest_streak, self.current_streak
                ),
            });
        }
        Ok(())
    }
}

/// User preferences. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Tone volume, 0.0 ..= 1.0
    pub volume: f32,
    pub breathing_cues_enabled: bool,
    #[serde(alias = "defaultProtocol")]
    pub default_protocol_id: String,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            breathing_cues_enabled: true,
            default_protocol_id: QUICK_PROTOCOL_ID.into(),
            theme: "light".into(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ValidationError::InvalidValue {
                field: "volume".into(),
                message: format!("{} is outside 0.0..=1.0", self.volume),
            });
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(volume) = patch.volume {
            self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        }
        if let Some(enabled) = patch.breathing_cues_enabled {
            self.breathing_cues_enabled = enabled;
        }
        if let Some(id) = patch.default_protocol_id {
            self.default_protocol_id = id;
        }
        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
    }
}

/// Partial settings update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub volume: Option<f32>,
    pub breathing_cues_enabled: Option<bool>,
    pub default_protocol_id: Option<String>,
    pub theme: Option<String>,
}

/// Aggregate statistics over the stored history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_sessions: u64,
    pub total_time_seconds: u64,
    pub completion_rate_percent: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(rename = "sessionsInLast7Days")]
    pub sessions_in_last_7_days: u64,
    #[serde(rename = "sessionsInLast30Days")]
    pub sessions_in_last_30_days: u64,
    pub average_session_length_seconds: u64,
}
