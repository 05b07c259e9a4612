use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use tracing_insights_sink::{
    init::init_tracing,
    record::TelemetryRecord,
    sink::TelemetrySink,
};

/// Example of integrating a completely custom backend by implementing
/// the `TelemetrySink` trait directly. Imagine this talks to some
/// proprietary monitoring product for which this crate does not provide
/// a built-in sink.
struct MyCustomMonitoringSink;

#[async_trait]
impl TelemetrySink for MyCustomMonitoringSink {
    async fn send(&self, record: &TelemetryRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Here you would call your own client library for the target
        // backend. For the sake of example we just print the record.
        println!("[my-custom-monitoring] {:?}", record);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let sink: Arc<dyn TelemetrySink> = Arc::new(MyCustomMonitoringSink);

    init_tracing(sink);

    info!("custom backend example started");
    error!(backend = "my-custom-monitoring", "simulated error sent via custom backend");
}
