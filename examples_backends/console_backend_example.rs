use std::sync::Arc;

use tokio::time::{sleep, Duration};
use tracing::error;

use tracing_insights_sink::console::ConsoleSink;
use tracing_insights_sink::init::{init_tracing_with_config, LayerConfig};

/// Ships each captured record as one JSON line to stdout. Run with
/// `--features console`.
#[tokio::main]
async fn main() {
    let sink = Arc::new(ConsoleSink);

    let layer_config = LayerConfig {
        enable_stdout: false,
        ..LayerConfig::default()
    };

    init_tracing_with_config(sink, layer_config);

    error!(request_id = "r-123", status = 502, "upstream request failed");

    sleep(Duration::from_secs(2)).await;
}
