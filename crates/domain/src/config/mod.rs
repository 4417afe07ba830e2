mod agent;
mod observability;
mod remote;
mod server;
mod starters;
mod tools;

pub use agent::*;
pub use observability::*;
pub use remote::*;
pub use server::*;
pub use starters::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub attachments: AttachmentsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    /// Conversation starters; the four built-in prompts when omitted.
    #[serde(default = "starters::d_starters")]
    pub starters: Vec<StarterConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            agent: AgentConfig::default(),
            limits: LimitsConfig::default(),
            tools: ToolsConfig::default(),
            database: DatabaseConfig::default(),
            attachments: AttachmentsConfig::default(),
            auth: AuthConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            starters: starters::d_starters(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.remote.endpoint.trim().is_empty() {
            errors.push(ConfigError::error(
                "remote.endpoint",
                "endpoint must not be empty",
            ));
        }
        if self.remote.request_timeout_secs == 0 {
            errors.push(ConfigError::error(
                "remote.request_timeout_secs",
                "timeout must be greater than 0",
            ));
        }

        if self.agent.model.trim().is_empty() {
            errors.push(ConfigError::error("agent.model", "model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.agent.temperature) {
            errors.push(ConfigError::error(
                "agent.temperature",
                "temperature must be within [0, 2]",
            ));
        }

        if !(0.0..=2.0).contains(&self.limits.temperature) {
            errors.push(ConfigError::error(
                "limits.temperature",
                "temperature must be within [0, 2]",
            ));
        }
        if !(0.0..=1.0).contains(&self.limits.top_p) {
            errors.push(ConfigError::error("limits.top_p", "top_p must be within [0, 1]"));
        }
        if self.limits.max_completion_tokens == 0 {
            errors.push(ConfigError::error(
                "limits.max_completion_tokens",
                "must be greater than 0",
            ));
        }
        if self.limits.stream_idle_timeout_secs == 0 {
            errors.push(ConfigError::error(
                "limits.stream_idle_timeout_secs",
                "must be greater than 0",
            ));
        }

        if !self.tools.sales_query && !self.tools.code_interpreter && !self.tools.file_search {
            errors.push(ConfigError::warning(
                "tools",
                "no tools enabled; the agent can only answer from its instructions",
            ));
        }
        if matches!(&self.tools.bing_connection_id, Some(id) if id.trim().is_empty()) {
            errors.push(ConfigError::error(
                "tools.bing_connection_id",
                "connection id must not be empty when set",
            ));
        }

        if self.auth.enabled && self.auth.username.trim().is_empty() {
            errors.push(ConfigError::error(
                "auth.username",
                "username must not be empty when auth is enabled",
            ));
        }

        if self.server.port == 0 {
            errors.push(ConfigError::error(
                "server.port",
                "port must be greater than 0",
            ));
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError::error("server.host", "host must not be empty"));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample rate must be within [0, 1]",
            ));
        }

        // CORS: warn if wildcard is used.
        if self.server.cors.allowed_origins.iter().any(|o| o == "*") {
            errors.push(ConfigError::warning(
                "server.cors.allowed_origins",
                "wildcard \"*\" allows all origins (not recommended for production)",
            ));
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError::error(
                "observability.sample_rate",
                "sample_rate must be within [0, 1]",
            ));
        }

        for (i, starter) in self.starters.iter().enumerate() {
            if starter.message.trim().is_empty() {
                errors.push(ConfigError::warning(
                    &format!("starters[{i}].message"),
                    "starter has an empty message",
                ));
            }
        }

        errors
    }
}
