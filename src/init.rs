use crate::diag::{DiagnosticSink, NoopDiagnostics};
use crate::layer::TelemetryLayer;
use crate::sink::TelemetrySink;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration for the telemetry layer.
///
/// Controls the size of the internal buffer, the maximum batch size sent
/// to the sink in one go, the forced-flush cadence, the minimum event
/// level that is captured, and whether events are additionally printed to
/// the console via a `fmt` layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`TelemetryRecord`]s queued before
///   new records are dropped.
/// - `batch_size`: batch size for sink submission.
/// - `flush_interval`: maximum interval between flushes even with a
///   partially filled batch.
/// - `min_level`: events below this level are ignored by the layer.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`TelemetryLayer`] and events are also printed to
///   the console.
///
/// [`TelemetryRecord`]: crate::record::TelemetryRecord
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            min_level: Level::ERROR,
            enable_stdout: true,
        }
    }
}

/// Initialize global `tracing` subscriber using the provided sink,
/// diagnostics destination and [`LayerConfig`].
///
/// **Parameters**
/// - `sink`: implementation of [`TelemetrySink`] that will receive
///   normalized [`TelemetryRecord`]s.
/// - `diag`: destination for the library's self-diagnostics (duplicate
///   property keys, dropped records, failed batches).
/// - `config`: [`LayerConfig`] controlling buffering and batching
///   behavior of the layer.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with [`TelemetryLayer`] as the
/// global default subscriber, so all `tracing` events in the process
/// are observed by the layer.
///
/// [`TelemetryRecord`]: crate::record::TelemetryRecord
pub fn init_tracing_with_diagnostics(
    sink: Arc<dyn TelemetrySink>,
    diag: Arc<dyn DiagnosticSink>,
    config: LayerConfig,
) {
    let (layer, _handle) = TelemetryLayer::new(
        sink,
        diag,
        config.min_level,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
    );

    // The telemetry layer is always installed. With `enable_stdout = true`
    // a `fmt` layer is stacked on top so events remain visible on the
    // console. The subscriber is assembled in two variants to keep the
    // types compatible.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber).expect("set global subscriber");
    }
}

/// Initialize global `tracing` subscriber using the provided sink and
/// [`LayerConfig`], with self-diagnostics disabled.
pub fn init_tracing_with_config(sink: Arc<dyn TelemetrySink>, config: LayerConfig) {
    init_tracing_with_diagnostics(sink, Arc::new(NoopDiagnostics), config);
}

/// Initialize tracing with sensible defaults.
///
/// **Parameters**
/// - `sink`: implementation of [`TelemetrySink`] that will receive
///   normalized [`TelemetryRecord`]s.
///
/// **Behavior**
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`]. This is the recommended entrypoint for
/// typical microservices.
///
/// [`TelemetryRecord`]: crate::record::TelemetryRecord
pub fn init_tracing(sink: Arc<dyn TelemetrySink>) {
    init_tracing_with_config(sink, LayerConfig::default());
}
