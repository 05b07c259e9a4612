/// Environment variable names used by this crate for convenient
/// configuration of sinks from microservices.
///
/// These are purely helpers; the core sink types remain decoupled from
/// environment access.

/// Application Insights connection string, e.g.
/// `InstrumentationKey=...;IngestionEndpoint=https://...`.
pub const INSIGHTS_CONNECTION_STRING_ENV: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

/// Optional logical role name stamped into the `ai.cloud.role` tag.
pub const INSIGHTS_ROLE_NAME_ENV: &str = "APPLICATIONINSIGHTS_ROLE_NAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
