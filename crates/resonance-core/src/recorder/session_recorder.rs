use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::export::{ExportDocument, ImportDocument, ImportSummary, EXPORT_FORMAT_VERSION};
use super::model::{SessionRecord, Settings, SettingsPatch, Stats, StreakState};
use super::stats::{apply_retention, compute_stats};
use crate::error::{RecorderError, StoreError};
use crate::storage::KeyValueStore;
use crate::time::{SystemClock, WallClock};

pub const SESSIONS_KEY: &str = "resonance_sessions";
pub const SETTINGS_KEY: &str = "resonance_settings";
pub const STREAK_KEY: &str = "resonance_streak";

const PROBE_KEY: &str = "__resonance_storage_probe__";

/// History limits applied on every write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderConfig {
    pub max_sessions: usize,
    pub retention: chrono::Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_sessions: 100,
            retention: chrono::Duration::days(180),
        }
    }
}

/// Persists session history, the streak and user settings.
///
/// Reads never fail: a missing or corrupt document yields its default and
/// a warning. Writes report [`RecorderError`].
#[derive(Debug)]
pub struct SessionRecorder<K: KeyValueStore, C: WallClock = SystemClock> {
    store: K,
    clock: C,
    config: RecorderConfig,
}

impl<K: KeyValueStore> SessionRecorder<K, SystemClock> {
    pub fn new(store: K) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<K: KeyValueStore, C: WallClock> SessionRecorder<K, C> {
    pub fn with_clock(store: K, clock: C) -> Self {
        Self {
            store,
            clock,
            config: RecorderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RecorderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Record a session that ran to the end of its countdown.
    ///
    /// The record counts as completed when the practised time reached the
    /// requested duration; completed records advance the streak.
    pub fn record_completed_session(
        &mut self,
        protocol_id: &str,
        requested_duration_secs: u64,
        completed_duration_secs: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RecorderError> {
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            protocol_id: protocol_id.to_string(),
            started_at,
            completed_at: Some(completed_at),
            requested_duration_secs,
            completed_duration_secs,
            completed: completed_duration_secs >= requested_duration_secs,
        };
        self.persist(record)
    }

    /// Record a session ended early by the user. Never touches the streak.
    pub fn record_stopped_session(
        &mut self,
        protocol_id: &str,
        requested_duration_secs: u64,
        completed_duration_secs: u64,
        started_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RecorderError> {
        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            protocol_id: protocol_id.to_string(),
            started_at,
            completed_at: None,
            requested_duration_secs,
            completed_duration_secs,
            completed: false,
        };
        self.persist(record)
    }

    fn persist(&mut self, record: SessionRecord) -> Result<SessionRecord, RecorderError> {
        let mut sessions = self.sessions();
        sessions.insert(0, record.clone());
        apply_retention(&mut sessions, self.clock.now(), &self.config);
        self.write_sessions(sessions)?;
        if record.completed {
            // The record is already stored; a streak write failure does not undo it.
            if let Err(err) = self.update_streak(&record) {
                warn!(id = %record.id, error = %err, "streak not updated");
            }
        }
        info!(
            id = %record.id,
            protocol = %record.protocol_id,
            completed = record.completed,
            secs = record.completed_duration_secs,
            "session recorded"
        );
        Ok(record)
    }

    /// Fold a record's local calendar day into the streak.
    ///
    /// Incomplete records and days not after the last practice day leave
    /// the stored streak untouched.
    pub fn update_streak(&mut self, record: &SessionRecord) -> Result<StreakState, RecorderError> {
        let mut streak = self.streak();
        if !record.completed {
            return Ok(streak);
        }
        let day = self.clock.local_date(record.finished_at());
        if streak.register_practice_day(day) {
            self.write_doc(STREAK_KEY, &streak)?;
            debug!(%day, current = streak.current_streak, "streak updated");
        }
        Ok(streak)
    }

    /// Stored history, newest first.
    pub fn sessions(&self) -> Vec<SessionRecord> {
        self.read_or_default(SESSIONS_KEY)
    }

    pub fn streak(&self) -> StreakState {
        self.read_or_default(STREAK_KEY)
    }

    pub fn settings(&self) -> Settings {
        self.read_or_default(SETTINGS_KEY)
    }

    /// Merge `patch` into the stored settings and persist the result.
    pub fn save_settings(&mut self, patch: SettingsPatch) -> Result<Settings, RecorderError> {
        let mut settings = self.settings();
        settings.apply(patch);
        self.write_doc(SETTINGS_KEY, &settings)?;
        Ok(settings)
    }

    /// Replace the stored settings wholesale.
    ///
    /// # Errors
    /// Out-of-range values are rejected before anything is written.
    pub fn replace_settings(&mut self, settings: Settings) -> Result<Settings, RecorderError> {
        settings
            .validate()
            .map_err(|e| RecorderError::ImportMalformed(e.to_string()))?;
        self.write_doc(SETTINGS_KEY, &settings)?;
        Ok(settings)
    }

    pub fn compute_stats(&self) -> Stats {
        compute_stats(&self.sessions(), &self.streak(), self.clock.now())
    }

    /// Pretty-printed export of all three documents.
    pub fn export_data(&self) -> Result<String, RecorderError> {
        let doc = ExportDocument {
            sessions: self.sessions(),
            settings: self.settings(),
            streak: self.streak(),
            export_date: self.clock.now(),
            version: EXPORT_FORMAT_VERSION.to_string(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Suggested file name for an export taken now.
    pub fn export_file_name(&self) -> String {
        super::export::export_file_name(self.clock.local_date(self.clock.now()))
    }

    /// Replace the sections present in `json`.
    ///
    /// The payload is fully validated before the first write. If a later
    /// write fails, sections already written are restored.
    pub fn import_data(&mut self, json: &str) -> Result<ImportSummary, RecorderError> {
        let doc = ImportDocument::parse(json)?;

        let mut summary = ImportSummary::default();
        let mut writes: Vec<(&'static str, String)> = Vec::new();
        if let Some(sessions) = &doc.sessions {
            writes.push((SESSIONS_KEY, serde_json::to_string(sessions)?));
            summary.sessions = Some(sessions.len());
        }
        if let Some(settings) = &doc.settings {
            writes.push((SETTINGS_KEY, serde_json::to_string(settings)?));
            summary.settings = true;
        }
        if let Some(streak) = &doc.streak {
            writes.push((STREAK_KEY, serde_json::to_string(streak)?));
            summary.streak = true;
        }

        let mut previous = Vec::with_capacity(writes.len());
        for (key, _) in &writes {
            let old = self.store.get(key).unwrap_or_else(|err| {
                warn!(key, error = %err, "could not snapshot document before import");
                None
            });
            previous.push((*key, old));
        }

        for (index, (key, value)) in writes.iter().enumerate() {
            if let Err(err) = self.store.set(key, value) {
                self.restore(&previous[..index]);
                return Err(RecorderError::StorageWriteFailed {
                    key: key.to_string(),
                    source: err.for_key(key),
                });
            }
        }

        info!(?summary, "import applied");
        Ok(summary)
    }

    fn restore(&mut self, previous: &[(&'static str, Option<String>)]) {
        for (key, old) in previous {
            let result = match old {
                Some(value) => self.store.set(key, value),
                None => self.store.remove(key),
            };
            if let Err(err) = result {
                warn!(key, error = %err, "rollback after failed import did not restore document");
            }
        }
    }

    /// Remove sessions, settings and streak.
    pub fn clear_all_data(&mut self) -> Result<(), RecorderError> {
        for key in [SESSIONS_KEY, SETTINGS_KEY, STREAK_KEY] {
            self.store
                .remove(key)
                .map_err(|source| RecorderError::StorageWriteFailed {
                    key: key.to_string(),
                    source,
                })?;
        }
        info!("all recorded data cleared");
        Ok(())
    }

    /// Probe the store with a throwaway write.
    pub fn is_storage_available(&mut self) -> bool {
        let ok = self.store.set(PROBE_KEY, "1").is_ok() && self.store.remove(PROBE_KEY).is_ok();
        if !ok {
            warn!("storage probe failed");
        }
        ok
    }

    fn read_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RecorderError> {
        let raw = self
            .store
            .get(key)
            .map_err(|err| RecorderError::StorageReadCorrupt {
                key: key.to_string(),
                message: err.to_string(),
            })?;
        raw.map(|raw| {
            serde_json::from_str(&raw).map_err(|err| RecorderError::StorageReadCorrupt {
                key: key.to_string(),
                message: err.to_string(),
            })
        })
        .transpose()
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.read_doc(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "using defaults");
                T::default()
            }
        }
    }

    /// Write a document; on quota exhaustion keep the newer half of the
    /// stored history (rounded up, so the newest record survives) and retry
    /// once.
    fn write_doc<T: Serialize>(&mut self, key: &str, doc: &T) -> Result<(), RecorderError> {
        let json = serde_json::to_string(doc)?;
        match self.store.set(key, &json) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() => {
                let mut sessions = self.sessions();
                let keep = sessions.len().div_ceil(2);
                warn!(key, kept = keep, dropped = sessions.len() - keep, "storage quota exceeded, trimming history");
                if keep < sessions.len() {
                    sessions.truncate(keep);
                    self.store
                        .set(SESSIONS_KEY, &serde_json::to_string(&sessions)?)
                        .map_err(|source| write_failed(SESSIONS_KEY, source))?;
                }
                self.store.set(key, &json).map_err(|source| write_failed(key, source))
            }
            Err(err) => Err(write_failed(key, err)),
        }
    }

    /// Write the history; on quota exhaustion keep the newer half (rounded
    /// up) and retry once.
    fn write_sessions(&mut self, mut sessions: Vec<SessionRecord>) -> Result<(), RecorderError> {
        let json = serde_json::to_string(&sessions)?;
        match self.store.set(SESSIONS_KEY, &json) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota_exceeded() => {
                let keep = sessions.len().div_ceil(2);
                warn!(kept = keep, dropped = sessions.len() - keep, "storage quota exceeded, trimming history");
                sessions.truncate(keep);
                self.store
                    .set(SESSIONS_KEY, &serde_json::to_string(&sessions)?)
                    .map_err(|source| write_failed(SESSIONS_KEY, source))
            }
            Err(err) => Err(write_failed(SESSIONS_KEY, err)),
        }
    }
}

fn write_failed(key: &str, source: StoreError) -> RecorderError {
    RecorderError::StorageWriteFailed {
        key: key.to_string(),
        source: source.for_key(key),
    }
}
