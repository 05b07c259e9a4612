use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    /// Flat attribute set attached to the outbound record. Populated once
    /// per event by the property formatter; keys are unique and values are
    /// the formatted JSON text of the captured field values.
    pub properties: BTreeMap<String, String>,
    pub message: Option<String>,
    pub role_name: Option<String>,
}
