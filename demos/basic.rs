use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[cfg(feature = "appinsights")]
use tracing_insights_sink::appinsights::{AppInsightsConfig, AppInsightsSink};
use tracing_insights_sink::init::init_tracing;

#[tokio::main]
async fn main() {
    #[cfg(feature = "appinsights")]
    {
        let config = AppInsightsConfig::new("00000000-0000-0000-0000-000000000000")
            .with_role_name("auth-service");
        let sink = Arc::new(AppInsightsSink::new(config));
        init_tracing(sink);
    }

    info!("starting service");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    sleep(Duration::from_secs(2)).await;
}
