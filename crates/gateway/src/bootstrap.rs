//! AppState construction shared by `serve`, `run` and `chat`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;

use ar_domain::config::{Config, ConfigSeverity};
use ar_remote::{AgentServiceClient, RunClient};
use ar_tools::{SalesData, SalesQueryTool, ToolRegistry};

use crate::runtime::{CancelMap, Orchestrator, SessionLockMap, SessionStore};
use crate::state::AppState;
use crate::surface::Authenticator;

/// Validate config, wire every subsystem and return the [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Remote client ────────────────────────────────────────────────
    let client: Arc<dyn RunClient> = Arc::new(
        AgentServiceClient::from_config(&config.remote)
            .context("creating agent service client")?,
    );
    tracing::info!(endpoint = %config.remote.endpoint, "agent service client ready");

    // ── Local tools ──────────────────────────────────────────────────
    let sales = SalesData::open(&config.database.path).context("preparing sales database")?;
    let tools = build_tool_registry(&config, &sales)?;
    tracing::info!(tools = ?tools.names(), "tool registry ready");

    let orchestrator = Orchestrator::new(client, Arc::new(tools), sales, config.clone());
    tracing::info!(
        download_dir = %orchestrator.mediator().download_dir().display(),
        "attachment mediator ready"
    );

    Ok(AppState {
        authenticator: Arc::new(Authenticator::from_config(&config.auth)),
        config,
        orchestrator: Arc::new(orchestrator),
        sessions: Arc::new(SessionStore::new()),
        session_locks: Arc::new(SessionLockMap::new()),
        cancel_map: Arc::new(CancelMap::new()),
        issued_tokens: Arc::new(RwLock::new(HashMap::new())),
    })
}

pub fn build_tool_registry(config: &Config, sales: &SalesData) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    if config.tools.sales_query {
        registry
            .register(Arc::new(SalesQueryTool::new(sales.clone())))
            .context("registering sales query tool")?;
    }
    Ok(registry)
}
