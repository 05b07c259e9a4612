use std::sync::Arc;

use crate::sink::TelemetrySink;

/// Supported backend kinds that can be selected via DSN or config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    AppInsights,
    Console,
}

/// High-level backend configuration built from a DSN or explicit fields.
///
/// For now it only stores the target kind and the raw DSN string; this
/// keeps the API stable while individual backends remain optional.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected backend implementation.
    pub kind: BackendKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, dsn: impl Into<String>) -> Self {
        BackendConfig { kind, dsn: dsn.into() }
    }
}

/// Parse a DSN string and infer the backend kind from its scheme.
///
/// Examples:
/// - "appinsights://InstrumentationKey=abc;IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com"
/// - "InstrumentationKey=abc;IngestionEndpoint=..." (bare connection string)
/// - "console://"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let lower = dsn.to_ascii_lowercase();

    if lower.starts_with("appinsights://") {
        Ok(BackendConfig::new(BackendKind::AppInsights, dsn))
    } else if lower.starts_with("instrumentationkey=") {
        // A raw Application Insights connection string, no scheme.
        Ok(BackendConfig::new(BackendKind::AppInsights, dsn))
    } else if lower.starts_with("console://") {
        Ok(BackendConfig::new(BackendKind::Console, dsn))
    } else {
        Err(DsnError::UnknownScheme)
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,
}

/// Error type returned when building a backend sink from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("appinsights feature is not enabled")]
    AppInsightsFeatureDisabled,

    #[error("invalid Application Insights connection string: {0}")]
    InvalidConnectionString(String),

    #[error("backend kind not yet implemented: {0:?}")]
    Unimplemented(BackendKind),
}

/// Create a concrete `TelemetrySink` implementation from a `BackendConfig`.
///
/// This is the main entry point for applications that want to select
/// a backend using a single DSN string instead of constructing sinks
/// manually.
pub fn make_sink_from_config(cfg: &BackendConfig) -> Result<Arc<dyn TelemetrySink>, BackendBuildError> {
    match cfg.kind {
        BackendKind::AppInsights => {
            #[cfg(feature = "appinsights")]
            {
                use crate::appinsights::{AppInsightsConfig, AppInsightsSink};

                let connection_string = cfg
                    .dsn
                    .strip_prefix("appinsights://")
                    .unwrap_or(&cfg.dsn);

                let config = AppInsightsConfig::from_connection_string(connection_string)
                    .map_err(|e| BackendBuildError::InvalidConnectionString(e.to_string()))?;

                let sink = AppInsightsSink::new(config);
                Ok(Arc::new(sink) as Arc<dyn TelemetrySink>)
            }

            #[cfg(not(feature = "appinsights"))]
            {
                let _ = cfg; // silence unused warning when feature is disabled
                Err(BackendBuildError::AppInsightsFeatureDisabled)
            }
        }
        BackendKind::Console => {
            #[cfg(feature = "console")]
            {
                use crate::console::ConsoleSink;

                Ok(Arc::new(ConsoleSink) as Arc<dyn TelemetrySink>)
            }

            #[cfg(not(feature = "console"))]
            {
                let _ = cfg;
                Err(BackendBuildError::Unimplemented(BackendKind::Console))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_scheme_selects_the_backend_kind() {
        let cfg = parse_dsn("appinsights://InstrumentationKey=abc").unwrap();
        assert_eq!(cfg.kind, BackendKind::AppInsights);

        let cfg = parse_dsn("console://").unwrap();
        assert_eq!(cfg.kind, BackendKind::Console);
    }

    #[test]
    fn bare_connection_string_is_recognized() {
        let cfg = parse_dsn("InstrumentationKey=abc;IngestionEndpoint=https://x.example").unwrap();
        assert_eq!(cfg.kind, BackendKind::AppInsights);
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(parse_dsn("mysql://localhost"), Err(DsnError::UnknownScheme)));
    }
}
