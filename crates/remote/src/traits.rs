use std::path::Path;

use ar_domain::attachment::{FilePurpose, MessageAttachment, RemoteFile};
use ar_domain::error::Result;
use ar_domain::event::{BoxStream, RunEvent};
use ar_domain::tool::{AgentTool, ToolOutput};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / handle types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event stream of one run (or of one continuation after a tool-output
/// submission).
pub type RunStream = BoxStream<'static, Result<RunEvent>>;

/// Everything needed to create the remote agent.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSpec {
    pub model: String,
    pub name: String,
    pub instructions: String,
    pub tools: Vec<AgentTool>,
    pub temperature: f32,
}

/// Per-run token and sampling limits.
#[derive(Debug, Clone, Serialize)]
pub struct RunLimits {
    pub max_completion_tokens: u32,
    pub max_prompt_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// Overrides the agent's instructions for this run only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandle {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Operations the relay needs from the remote agent service.
///
/// The run state machine lives on the remote side. The only way a caller
/// advances a run is [`RunClient::submit_tool_outputs`], which yields the
/// continuation stream for the same run.
#[async_trait::async_trait]
pub trait RunClient: Send + Sync {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle>;

    async fn create_thread(&self) -> Result<ThreadHandle>;

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        attachments: &[MessageAttachment],
    ) -> Result<()>;

    /// Start a run of `agent_id` on the thread and stream its events.
    async fn open_stream(
        &self,
        thread_id: &str,
        agent_id: &str,
        limits: &RunLimits,
    ) -> Result<RunStream>;

    /// Submit every output of one requires-action episode in a single call.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream>;

    async fn delete_thread(&self, thread_id: &str) -> Result<()>;

    async fn delete_agent(&self, agent_id: &str) -> Result<()>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    async fn list_files(&self) -> Result<Vec<RemoteFile>>;

    async fn upload_file(&self, path: &Path, purpose: FilePurpose) -> Result<RemoteFile>;

    async fn get_file_content(
        &self,
        file_id: &str,
    ) -> Result<BoxStream<'static, Result<Bytes>>>;
}
