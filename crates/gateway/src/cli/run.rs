//! `agentrelay run`: one turn, then exit.

use std::path::PathBuf;
use std::sync::Arc;

use ar_domain::config::Config;

use crate::bootstrap;
use crate::runtime::{TurnInput, TurnOutcome};
use crate::surface::ConsoleSurface;

pub async fn run(
    config: Arc<Config>,
    message: String,
    attachments: Vec<PathBuf>,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    let user = super::login_prompt(&state)?;
    let session = state.sessions.get_or_create(&format!("cli:run:{user}"));
    let cancel = state.cancel_map.register(session.key());

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let surface = ConsoleSurface::new();
    let input = TurnInput {
        content: message,
        attachments,
    };
    let result = state
        .orchestrator
        .run_turn(&session, &surface, input, &cancel)
        .await;

    state.shutdown_sessions().await;

    match result {
        Ok(TurnOutcome::Completed(summary)) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(())
        }
        Ok(TurnOutcome::Cancelled { .. }) => {
            eprintln!("turn stopped");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
