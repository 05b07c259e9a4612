use crate::record::TelemetryRecord;
use crate::sink::TelemetrySink;
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;

/// Default public ingestion endpoint, used when the connection string does
/// not carry an `IngestionEndpoint` pair.
pub const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";

/// Configuration for [`AppInsightsSink`].
///
/// The sink talks to the Application Insights track endpoint over HTTPS,
/// one envelope per record. Typically built from a connection string via
/// [`AppInsightsConfig::from_connection_string`].
#[derive(Clone, Debug)]
pub struct AppInsightsConfig {
    /// Base ingestion URL without the `/v2/track` path,
    /// e.g. "https://westeurope-5.in.applicationinsights.azure.com".
    pub ingestion_endpoint: String,
    pub instrumentation_key: String,
    /// Logical role name stamped into the `ai.cloud.role` tag.
    pub role_name: Option<String>,
}

/// Error type returned when parsing a connection string.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionStringError {
    #[error("connection string has no InstrumentationKey pair")]
    MissingInstrumentationKey,
}

impl AppInsightsConfig {
    pub fn new(instrumentation_key: impl Into<String>) -> Self {
        AppInsightsConfig {
            ingestion_endpoint: DEFAULT_INGESTION_ENDPOINT.to_string(),
            instrumentation_key: instrumentation_key.into(),
            role_name: None,
        }
    }

    /// Parse an Application Insights connection string.
    ///
    /// The format is a semicolon-separated list of `Key=Value` pairs, e.g.
    ///   "InstrumentationKey=00000000-0000-0000-0000-000000000000;IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com/"
    ///
    /// Keys are matched case-insensitively and unknown pairs are ignored.
    /// `InstrumentationKey` is required; the ingestion endpoint falls back
    /// to [`DEFAULT_INGESTION_ENDPOINT`].
    pub fn from_connection_string(s: &str) -> Result<Self, ConnectionStringError> {
        let mut instrumentation_key: Option<String> = None;
        let mut ingestion_endpoint: Option<String> = None;

        for pair in s.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            if key.eq_ignore_ascii_case("InstrumentationKey") {
                instrumentation_key = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("IngestionEndpoint") {
                ingestion_endpoint = Some(value.trim_end_matches('/').to_string());
            }
        }

        let instrumentation_key = instrumentation_key
            .filter(|k| !k.is_empty())
            .ok_or(ConnectionStringError::MissingInstrumentationKey)?;

        Ok(AppInsightsConfig {
            ingestion_endpoint: ingestion_endpoint
                .unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_string()),
            instrumentation_key,
            role_name: None,
        })
    }

    pub fn with_role_name(mut self, role_name: impl Into<String>) -> Self {
        self.role_name = Some(role_name.into());
        self
    }
}

/// Application Insights implementation of [`TelemetrySink`] using the
/// `/v2/track` HTTP interface.
#[derive(Clone)]
pub struct AppInsightsSink {
    client: Client,
    config: AppInsightsConfig,
}

impl AppInsightsSink {
    /// Construct a new sink instance using the provided configuration.
    ///
    /// **Parameters**
    /// - `config`: [`AppInsightsConfig`] describing the ingestion endpoint,
    ///   instrumentation key and optional role name.
    ///
    /// **Returns**
    /// - A ready-to-use [`AppInsightsSink`] that can be passed into
    ///   [`init_tracing`] / [`init_tracing_with_config`].
    ///
    /// [`init_tracing`]: crate::init::init_tracing
    /// [`init_tracing_with_config`]: crate::init::init_tracing_with_config
    pub fn new(config: AppInsightsConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/track", self.config.ingestion_endpoint.trim_end_matches('/'))
    }

    fn map_record(&self, record: &TelemetryRecord) -> Envelope {
        let mut tags = BTreeMap::new();
        if let Some(role) = self
            .config
            .role_name
            .clone()
            .or_else(|| record.role_name.clone())
        {
            tags.insert("ai.cloud.role".to_string(), role);
        }

        Envelope {
            name: "Microsoft.ApplicationInsights.Message",
            time: record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            i_key: self.config.instrumentation_key.clone(),
            tags,
            data: Data {
                base_type: "MessageData",
                base_data: MessageData {
                    ver: 2,
                    message: record
                        .message
                        .clone()
                        .unwrap_or_else(|| record.target.clone()),
                    severity_level: severity_level(&record.level),
                    properties: record.properties.clone(),
                },
            },
        }
    }
}

/// Map a `tracing` level name onto the backend's 0-4 severity scale.
///
/// Critical (4) is reserved for fatal conditions that `tracing` levels
/// never express, so ERROR maps to Error (3).
fn severity_level(level: &str) -> i32 {
    match level {
        "TRACE" | "DEBUG" => 0,
        "INFO" => 1,
        "WARN" => 2,
        "ERROR" => 3,
        _ => 1,
    }
}

#[derive(Serialize)]
struct Envelope {
    name: &'static str,
    time: String,
    #[serde(rename = "iKey")]
    i_key: String,
    tags: BTreeMap<String, String>,
    data: Data,
}

#[derive(Serialize)]
struct Data {
    #[serde(rename = "baseType")]
    base_type: &'static str,
    #[serde(rename = "baseData")]
    base_data: MessageData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    ver: i32,
    message: String,
    severity_level: i32,
    properties: BTreeMap<String, String>,
}

#[async_trait]
impl TelemetrySink for AppInsightsSink {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let envelope = self.map_record(record);
        // The track endpoint accepts a JSON array of envelopes.
        let body = serde_json::to_string(&[envelope])?;
        let resp = self
            .client
            .post(&self.endpoint())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(format!("Application Insights track failed with status {}: {}", status, text).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn connection_string_happy_path() {
        let config = AppInsightsConfig::from_connection_string(
            "InstrumentationKey=abc-123;IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com/",
        )
        .unwrap();
        assert_eq!(config.instrumentation_key, "abc-123");
        assert_eq!(
            config.ingestion_endpoint,
            "https://westeurope-5.in.applicationinsights.azure.com"
        );
    }

    #[test]
    fn connection_string_keys_are_case_insensitive_and_unknown_pairs_ignored() {
        let config = AppInsightsConfig::from_connection_string(
            "instrumentationkey=abc;LiveEndpoint=https://live.example;",
        )
        .unwrap();
        assert_eq!(config.instrumentation_key, "abc");
        assert_eq!(config.ingestion_endpoint, DEFAULT_INGESTION_ENDPOINT);
    }

    #[test]
    fn connection_string_without_key_is_rejected() {
        let err = AppInsightsConfig::from_connection_string("IngestionEndpoint=https://x.example")
            .unwrap_err();
        assert!(matches!(err, ConnectionStringError::MissingInstrumentationKey));
    }

    #[test]
    fn severity_scale_covers_all_tracing_levels() {
        assert_eq!(severity_level("TRACE"), 0);
        assert_eq!(severity_level("DEBUG"), 0);
        assert_eq!(severity_level("INFO"), 1);
        assert_eq!(severity_level("WARN"), 2);
        assert_eq!(severity_level("ERROR"), 3);
    }

    #[test]
    fn map_record_builds_a_message_envelope() {
        let sink = AppInsightsSink::new(
            AppInsightsConfig::new("ikey").with_role_name("checkout"),
        );

        let mut properties = BTreeMap::new();
        properties.insert("user_id".to_string(), "42".to_string());

        let record = TelemetryRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            level: "ERROR".to_string(),
            target: "checkout::payment".to_string(),
            module_path: None,
            file: None,
            line: None,
            properties,
            message: Some("payment declined".to_string()),
            role_name: None,
        };

        let envelope = sink.map_record(&record);
        assert_eq!(envelope.name, "Microsoft.ApplicationInsights.Message");
        assert_eq!(envelope.i_key, "ikey");
        assert_eq!(envelope.tags["ai.cloud.role"], "checkout");
        assert_eq!(envelope.data.base_type, "MessageData");
        assert_eq!(envelope.data.base_data.ver, 2);
        assert_eq!(envelope.data.base_data.message, "payment declined");
        assert_eq!(envelope.data.base_data.severity_level, 3);
        assert_eq!(envelope.data.base_data.properties["user_id"], "42");
    }

    #[test]
    fn endpoint_appends_the_track_path_once() {
        let sink = AppInsightsSink::new(AppInsightsConfig::new("ikey"));
        assert_eq!(
            sink.endpoint(),
            "https://dc.services.visualstudio.com/v2/track"
        );
    }
}
