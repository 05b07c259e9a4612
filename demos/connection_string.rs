use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use tracing_insights_sink::backend::{make_sink_from_config, parse_dsn};
use tracing_insights_sink::env::{env_or, INSIGHTS_CONNECTION_STRING_ENV};
use tracing_insights_sink::init::init_tracing;

/// Select the backend from the standard environment variable, falling back
/// to a placeholder connection string.
#[tokio::main]
async fn main() {
    let dsn = env_or(
        INSIGHTS_CONNECTION_STRING_ENV,
        "InstrumentationKey=00000000-0000-0000-0000-000000000000",
    );

    let config = parse_dsn(&dsn).expect("parse DSN");
    let sink = make_sink_from_config(&config).expect("build sink");
    init_tracing(sink);

    info!("starting service");

    error!(order_id = 7, "order processing failed");

    sleep(Duration::from_secs(2)).await;
}
