//! JSON export and import documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{SessionRecord, Settings, StreakState};
use crate::error::RecorderError;

/// Version written into every export. Imports accept any `1.x`.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Everything the recorder persists, as written by an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub sessions: Vec<SessionRecord>,
    pub settings: Settings,
    pub streak: StreakState,
    pub export_date: DateTime<Utc>,
    pub version: String,
}

/// A parsed and validated import payload. Absent sections are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
    #[serde(default)]
    pub sessions: Option<Vec<SessionRecord>>,
    #[serde(default)]
    pub settings: Option<Settings>,
    #[serde(default)]
    pub streak: Option<StreakState>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Which sections an import replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Number of imported records, if the history was replaced
    pub sessions: Option<usize>,
    pub settings: bool,
    pub streak: bool,
}

impl ImportDocument {
    /// Parse and validate an import payload.
    ///
    /// # Errors
    /// [`RecorderError::ImportMalformed`] for invalid JSON, wrong shapes,
    /// an unsupported version or out-of-range values.
    pub fn parse(json: &str) -> Result<Self, RecorderError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RecorderError::ImportMalformed(e.to_string()))?;
        require_objects(&value)?;
        let doc: ImportDocument =
            serde_json::from_value(value).map_err(|e| RecorderError::ImportMalformed(e.to_string()))?;
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> Result<(), RecorderError> {
        if let Some(version) = &self.version {
            if version != "1" && !version.starts_with("1.") {
                return Err(RecorderError::ImportMalformed(format!(
                    "unsupported export version {version}"
                )));
            }
        }
        if let Some(settings) = &self.settings {
            settings
                .validate()
                .map_err(|e| RecorderError::ImportMalformed(e.to_string()))?;
        }
        if let Some(streak) = &self.streak {
            streak
                .validate()
                .map_err(|e| RecorderError::ImportMalformed(e.to_string()))?;
        }
        Ok(())
    }
}

/// Derived structs also accept JSON arrays matched by position; an import
/// document and each of its sections must be objects.
fn require_objects(value: &Value) -> Result<(), RecorderError> {
    let malformed = |what: &str| RecorderError::ImportMalformed(format!("{what} must be a JSON object"));
    let doc = value.as_object().ok_or_else(|| malformed("import document"))?;
    for section in ["settings", "streak"] {
        match doc.get(section) {
            None | Some(Value::Null) | Some(Value::Object(_)) => {}
            Some(_) => return Err(malformed(section)),
        }
    }
    if let Some(Value::Array(records)) = doc.get("sessions") {
        if !records.iter().all(Value::is_object) {
            return Err(malformed("each session"));
        }
    }
    Ok(())
}

/// `resonance-export-YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("resonance-export-{}.json", date.format("%Y-%m-%d"))
}
