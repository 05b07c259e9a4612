use crate::record::TelemetryRecord;
use crate::sink::TelemetrySink;
use async_trait::async_trait;
use std::error::Error;

/// Sink that writes each record as one JSON line to stdout.
///
/// Meant for local development and container setups where a log shipper
/// picks up NDJSON from the process output.
#[derive(Clone, Default)]
pub struct ConsoleSink;

#[async_trait]
impl TelemetrySink for ConsoleSink {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        let line = serde_json::to_string(record)?;
        println!("{}", line);
        Ok(())
    }
}
