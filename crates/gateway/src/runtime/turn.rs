//! Turn orchestration: attachments, lazy agent setup, one engine run, and
//! cleanup when the remote side fails.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ar_domain::config::Config;
use ar_domain::error::{Error, Result};
use ar_domain::tool::AgentTool;
use ar_remote::{AgentHandle, AgentSpec, Role, RunClient, RunLimits, ThreadHandle};
use ar_tools::{load_instructions, render_instructions, SalesData, ToolRegistry};

use super::attachments::AttachmentMediator;
use super::cancel::CancelToken;
use super::engine::{Engine, TurnOutcome};
use super::session::{Session, SessionState};
use crate::surface::UserSurface;

pub const UPLOADING: &str = "Uploading files.";
pub const UPLOADED: &str = "Uploading completed.";
pub const ATTACHMENT_FAILED: &str = "An error occurred while processing the attached file.";
pub const INIT_FAILED: &str = "An error occurred initializing the agent.";
pub const TRY_AGAIN: &str = "Please try again in a moment.";

/// One user message plus the local files to attach to it.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub content: String,
    pub attachments: Vec<PathBuf>,
}

impl TurnInput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// An upload failed; nothing was posted and the session is intact.
    #[error("attachment upload failed: {0}")]
    Attachment(#[source] Error),

    /// Agent or thread setup failed; the session refuses further turns.
    #[error("agent initialization failed: {0}")]
    Initialization(#[source] Error),

    /// Posting, streaming or submitting failed; remote resources were torn down.
    #[error("{0}")]
    Transport(#[source] Error),

    #[error("session is unusable after a failed initialization: {0}")]
    SessionPoisoned(String),
}

pub struct Orchestrator {
    client: Arc<dyn RunClient>,
    tools: Arc<ToolRegistry>,
    sales: SalesData,
    config: Arc<Config>,
    mediator: AttachmentMediator,
    /// Sessions currently holding remote resources; the database closes
    /// when this drops back to zero.
    active: AtomicUsize,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn RunClient>,
        tools: Arc<ToolRegistry>,
        sales: SalesData,
        config: Arc<Config>,
    ) -> Self {
        let mediator =
            AttachmentMediator::new(client.clone(), config.attachments.download_dir.clone());
        Self {
            client,
            tools,
            sales,
            config,
            mediator,
            active: AtomicUsize::new(0),
        }
    }

    pub fn mediator(&self) -> &AttachmentMediator {
        &self.mediator
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Run one turn on `session`, rendering onto `surface`.
    pub async fn run_turn(
        &self,
        session: &Session,
        surface: &dyn UserSurface,
        input: TurnInput,
        cancel: &CancelToken,
    ) -> std::result::Result<TurnOutcome, TurnError> {
        let mut state = session.state.lock().await;
        if let Some(reason) = &state.poisoned {
            surface.send_text(INIT_FAILED).await;
            return Err(TurnError::SessionPoisoned(reason.clone()));
        }

        // ── 1. Attachments ──────────────────────────────────────────
        if !input.attachments.is_empty() {
            surface.send_text(UPLOADING).await;
            for path in &input.attachments {
                match self.mediator.upload(path).await {
                    Ok(upload) => state.uploads.push(upload),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "attachment upload failed");
                        surface.send_text(ATTACHMENT_FAILED).await;
                        return Err(TurnError::Attachment(e));
                    }
                }
            }
            surface.send_text(UPLOADED).await;
        }

        // ── 2. Lazy agent + thread ──────────────────────────────────
        let (agent_id, thread_id) = match (&state.agent, &state.thread) {
            (Some(agent), Some(thread)) => (agent.id.clone(), thread.id.clone()),
            _ => {
                // Counted before connecting so a concurrent teardown cannot
                // close the database underneath this initialization.
                self.active.fetch_add(1, Ordering::AcqRel);
                match self.initialize().await {
                    Ok((agent, thread)) => {
                        let ids = (agent.id.clone(), thread.id.clone());
                        state.agent = Some(agent);
                        state.thread = Some(thread);
                        ids
                    }
                    Err(e) => {
                        self.release_active();
                        tracing::error!(session_key = session.key(), error = %e, "agent initialization failed");
                        surface.send_text(INIT_FAILED).await;
                        state.poisoned = Some(e.to_string());
                        return Err(TurnError::Initialization(e));
                    }
                }
            }
        };

        // ── 3. Post + stream ────────────────────────────────────────
        let attachments = state.message_attachments();
        let result: Result<TurnOutcome> = async {
            self.client
                .post_message(&thread_id, Role::User, &input.content, &attachments)
                .await?;
            let stream = self
                .client
                .open_stream(&thread_id, &agent_id, &self.run_limits())
                .await?;
            Engine::new(
                self.client.as_ref(),
                &self.tools,
                &self.mediator,
                surface,
                &thread_id,
            )
            .idle_timeout(Duration::from_secs(self.config.limits.stream_idle_timeout_secs))
            .run(stream, cancel)
            .await
        }
        .await;

        match result {
            Ok(outcome) => Ok(outcome),
            // ── 4. Transport failure ────────────────────────────────
            Err(e) => {
                tracing::error!(session_key = session.key(), error = %e, "turn failed, tearing down");
                surface.send_text(&format!("An error occurred: {e}")).await;
                surface.send_text(TRY_AGAIN).await;
                self.teardown_state(&mut state).await;
                Err(TurnError::Transport(e))
            }
        }
    }

    /// Delete the session's remote resources and forget them.
    pub async fn teardown(&self, session: &Session) {
        let mut state = session.state.lock().await;
        self.teardown_state(&mut state).await;
    }

    async fn teardown_state(&self, state: &mut SessionState) {
        self.mediator.delete_uploads(&state.uploads).await;
        if let Some(thread) = &state.thread {
            if let Err(e) = self.client.delete_thread(&thread.id).await {
                tracing::warn!(thread_id = %thread.id, error = %e, "failed to delete thread");
            }
        }
        if let Some(agent) = &state.agent {
            if let Err(e) = self.client.delete_agent(&agent.id).await {
                tracing::warn!(agent_id = %agent.id, error = %e, "failed to delete agent");
            }
        }
        let was_active = state.is_initialized();
        state.reset();

        if was_active {
            self.release_active();
        }
        tracing::info!("session torn down");
    }

    /// Drop one active session; the last one out closes the database.
    fn release_active(&self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.sales.close();
        }
    }

    async fn initialize(&self) -> Result<(AgentHandle, ThreadHandle)> {
        self.sales.connect().await?;
        let schema = self.sales.database_info().await?;
        let template = load_instructions(&self.config.agent.instructions_file).await?;
        let spec = AgentSpec {
            model: self.config.agent.model.clone(),
            name: self.config.agent.name.clone(),
            instructions: render_instructions(&template, &schema),
            tools: self.agent_tools(),
            temperature: self.config.agent.temperature,
        };

        let agent = self.client.create_agent(&spec).await?;
        tracing::info!(agent_id = %agent.id, model = %spec.model, "agent created");
        let thread = match self.client.create_thread().await {
            Ok(thread) => thread,
            Err(e) => {
                if let Err(del) = self.client.delete_agent(&agent.id).await {
                    tracing::warn!(agent_id = %agent.id, error = %del, "failed to delete agent");
                }
                return Err(e);
            }
        };
        tracing::info!(thread_id = %thread.id, "thread created");
        Ok((agent, thread))
    }

    /// Local function tools from the registry plus enabled hosted tools.
    pub fn agent_tools(&self) -> Vec<AgentTool> {
        let cfg = &self.config.tools;
        let mut tools: Vec<AgentTool> = self
            .tools
            .definitions()
            .into_iter()
            .map(AgentTool::function)
            .collect();
        if cfg.code_interpreter {
            tools.push(AgentTool::CodeInterpreter);
        }
        if cfg.file_search {
            tools.push(AgentTool::FileSearch);
        }
        if let Some(id) = cfg.bing_connection_id.as_deref().filter(|id| !id.is_empty()) {
            tools.push(AgentTool::bing_grounding(id));
        }
        tools
    }

    fn run_limits(&self) -> RunLimits {
        let limits = &self.config.limits;
        RunLimits {
            max_completion_tokens: limits.max_completion_tokens,
            max_prompt_tokens: limits.max_prompt_tokens,
            temperature: limits.temperature,
            top_p: limits.top_p,
            instructions: None,
        }
    }
}
