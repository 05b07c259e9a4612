use crate::diag::DiagnosticSink;
use crate::format::write_value;
use crate::record::TelemetryRecord;
use crate::sink::TelemetrySink;
use chrono::Utc;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// `tracing_subscriber` layer that observes events and forwards them to
/// an asynchronous [`TelemetrySink`] via a bounded channel and background
/// task.
///
/// Events at or above the configured minimum level are captured, their
/// structured fields flattened into the record's string property map, and
/// the result enqueued. Network I/O is fully decoupled from application
/// threads to minimize impact on request latency.
pub struct TelemetryLayer {
    sender: mpsc::Sender<TelemetryRecord>,
    diag: Arc<dyn DiagnosticSink>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl TelemetryLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`TelemetryRecord`]s from a bounded channel and sends them to the
    /// provided [`TelemetrySink`].
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations. Anomalies in
    /// the layer's own operation (full channel, failed batches) go to
    /// `diag`, never back into the `tracing` pipeline.
    pub fn new(
        sink: Arc<dyn TelemetrySink>,
        diag: Arc<dyn DiagnosticSink>,
        min_level: Level,
        buffer: usize,
        batch_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<()>) {
        // Enforce minimal thresholds to avoid degenerate configs.
        let buffer = buffer.max(16);
        let batch_size = batch_size.max(1);
        let flush_interval = if flush_interval < Duration::from_millis(10) {
            Duration::from_millis(10)
        } else {
            flush_interval
        };

        let (tx, mut rx) = mpsc::channel::<TelemetryRecord>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let enqueued_events_bg = Arc::clone(&enqueued_events);
        let diag_bg = Arc::clone(&diag);

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            let backoff = Duration::from_millis(100);
            let max_backoff = Duration::from_secs(10);

            loop {
                tokio::select! {
                    Some(record) = rx.recv() => {
                        batch.push(record);
                        enqueued_events_bg.fetch_add(1, Ordering::Relaxed);
                        if batch.len() >= batch_size {
                            if let Err(e) = send_batch(&*sink, &*diag_bg, &mut batch, backoff, max_backoff).await {
                                diag_bg.report(format_args!("error sending telemetry batch: {}", e));
                            }
                        }
                    }
                    _ = sleep(flush_interval) => {
                        if !batch.is_empty() {
                            if let Err(e) = send_batch(&*sink, &*diag_bg, &mut batch, backoff, max_backoff).await {
                                diag_bg.report(format_args!("error flushing telemetry batch: {}", e));
                            }
                        }
                    }
                }
            }
        });

        (Self {
            sender: tx,
            diag,
            min_level,
            total_events,
            enqueued_events,
            dropped_events,
        }, handle)
    }
}

async fn send_batch(
    sink: &dyn TelemetrySink,
    diag: &dyn DiagnosticSink,
    batch: &mut Vec<TelemetryRecord>,
    mut backoff: Duration,
    max_backoff: Duration,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let mut last_err: Option<Box<dyn Error + Send + Sync>> = None;
        for record in batch.iter() {
            if let Err(e) = sink.send(record).await {
                last_err = Some(e);
                break;
            }
        }

        if last_err.is_none() {
            batch.clear();
            return Ok(());
        }

        diag.report(format_args!("telemetry sink send failed, retrying in {:?}", backoff));
        sleep(backoff).await;
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}

/// Collapse a field name to the character set the backend accepts for
/// property names: anything outside `[A-Za-z0-9_]` becomes `_`.
///
/// Distinct field names can collide after this collapse ("user.id" and
/// "user id" both map to "user_id"); the property formatter keeps the
/// first and reports the rest through the diagnostics sink.
pub fn simplify_key(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Flatten captured typed field values into the record's property map.
///
/// Keys are simplified first, then each value goes through the property
/// formatter's insertion policy, so within one event the first field to
/// claim a simplified key wins.
pub fn flatten_fields(
    fields: &BTreeMap<String, serde_json::Value>,
    diag: &dyn DiagnosticSink,
) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    for (name, value) in fields {
        write_value(&simplify_key(name), Some(value), &mut properties, diag);
    }
    properties
}

impl<S> Layer<S> for TelemetryLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if *event.metadata().level() > self.min_level {
            return;
        }

        let mut fields = BTreeMap::new();
        let mut message: Option<String> = None;

        let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
        event.record(&mut visitor);

        let properties = flatten_fields(&fields, &*self.diag);

        let meta = event.metadata();
        let record = TelemetryRecord {
            timestamp: Utc::now(),
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            module_path: meta.module_path().map(|s| s.to_string()),
            file: meta.file().map(|s| s.to_string()),
            line: meta.line(),
            properties,
            message,
            role_name: None,
        };

        if let Err(_e) = self.sender.try_send(record) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
            self.diag.report(format_args!("telemetry channel full, dropping record"));
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::test_support::CapturingDiagnostics;
    use serde_json::json;

    #[test]
    fn simplify_key_collapses_disallowed_characters() {
        assert_eq!(simplify_key("user_id"), "user_id");
        assert_eq!(simplify_key("user.id"), "user_id");
        assert_eq!(simplify_key("user id"), "user_id");
        assert_eq!(simplify_key("http/status-code"), "http_status_code");
        assert_eq!(simplify_key(""), "");
    }

    #[test]
    fn flatten_keeps_first_value_when_simplified_keys_collide() {
        let mut fields = BTreeMap::new();
        fields.insert("user id".to_string(), json!("later"));
        fields.insert("user.id".to_string(), json!(42));

        let diag = CapturingDiagnostics::default();
        let properties = flatten_fields(&fields, &diag);

        // BTreeMap iterates "user id" before "user.id" (space < dot).
        assert_eq!(properties.len(), 1);
        assert_eq!(properties["user_id"], "later");
        assert_eq!(diag.lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn flatten_formats_each_value_kind() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!("Alice"));
        fields.insert("age".to_string(), json!(30));
        fields.insert("tags".to_string(), json!(["x", "y"]));

        let diag = CapturingDiagnostics::default();
        let properties = flatten_fields(&fields, &diag);

        assert_eq!(properties["name"], "Alice");
        assert_eq!(properties["age"], "30");
        assert_eq!(properties["tags"], r#"["x","y"]"#);
        assert!(diag.lines.lock().unwrap().is_empty());
    }
}
