use serde::{Deserialize, Serialize};

/// Logging and trace export.
///
/// `serve` logs JSON to stdout filtered by `RUST_LOG`, falling back to
/// `log_filter`. Setting `otlp_endpoint` additionally ships the turn and
/// remote-request spans to an OTLP/gRPC collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// e.g. `http://localhost:4317`. Unset disables export.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// Fraction of turns whose traces are exported.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,

    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "d_log_filter")]
    pub log_filter: String,
}

impl ObservabilityConfig {
    /// The OTLP endpoint, if export is configured.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
            log_filter: d_log_filter(),
        }
    }
}

fn d_service_name() -> String {
    "agentrelay".into()
}

fn d_sample_rate() -> f64 {
    1.0
}

fn d_log_filter() -> String {
    "info,ar_gateway=debug".into()
}
