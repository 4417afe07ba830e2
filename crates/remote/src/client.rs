//! HTTP implementation of [`RunClient`] for an Assistants-style agent
//! service (agents, threads, messages, runs, files).

use std::path::Path;
use std::time::Duration;

use ar_domain::attachment::{FilePurpose, MessageAttachment, RemoteFile};
use ar_domain::config::RemoteConfig;
use ar_domain::error::{Error, Result};
use ar_domain::event::BoxStream;
use ar_domain::tool::ToolOutput;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::sse::run_event_stream;
use crate::traits::{AgentHandle, AgentSpec, Role, RunClient, RunLimits, RunStream, ThreadHandle};
use crate::util::{check_status, from_reqwest, resolve_api_key};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct AgentServiceClient {
    base_url: String,
    api_version: String,
    auth_header: String,
    auth_value: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    data: Vec<RemoteFile>,
}

impl AgentServiceClient {
    /// Build a client from config, reading the credential from the
    /// configured environment variable.
    pub fn from_config(cfg: &RemoteConfig) -> Result<Self> {
        let key = resolve_api_key(&cfg.api_key_env)?;
        Self::new(cfg, &key)
    }

    pub fn new(cfg: &RemoteConfig, api_key: &str) -> Result<Self> {
        if cfg.endpoint.trim().is_empty() {
            return Err(Error::Config("remote.endpoint is empty".into()));
        }
        // No client-wide timeout: run streams may stay open far longer than
        // any single request. Plain requests set their own timeout.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.endpoint.trim_end_matches('/').to_string(),
            api_version: cfg.api_version.clone(),
            auth_header: cfg.auth_header.clone(),
            auth_value: format!("{}{}", cfg.auth_prefix, api_key),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            client,
        })
    }

    // ── Internal: request helpers ─────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.base_url, path, self.api_version
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(&self.auth_header, &self.auth_value)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let resp = req
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = check_status(resp).await?;
        let text = resp.text().await.map_err(from_reqwest)?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        tracing::debug!(path, "agent service request");
        self.send_json(self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "agent service delete");
        let resp = self
            .request(reqwest::Method::DELETE, path)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(from_reqwest)?;
        check_status(resp).await?;
        Ok(())
    }

    async fn post_stream(&self, path: &str, body: &Value) -> Result<RunStream> {
        tracing::debug!(path, "agent service stream request");
        let resp = self
            .request(reqwest::Method::POST, path)
            .header("Accept", "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = check_status(resp).await?;
        Ok(run_event_stream(resp))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request bodies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn agent_body(spec: &AgentSpec) -> Value {
    json!({
        "model": spec.model,
        "name": spec.name,
        "instructions": spec.instructions,
        "tools": spec.tools,
        "temperature": spec.temperature,
    })
}

fn message_body(role: Role, content: &str, attachments: &[MessageAttachment]) -> Value {
    let mut body = json!({
        "role": role.as_str(),
        "content": content,
    });
    if !attachments.is_empty() {
        body["attachments"] = json!(attachments);
    }
    body
}

fn run_body(agent_id: &str, limits: &RunLimits) -> Value {
    let mut body = json!({
        "assistant_id": agent_id,
        "stream": true,
        "max_completion_tokens": limits.max_completion_tokens,
        "max_prompt_tokens": limits.max_prompt_tokens,
        "temperature": limits.temperature,
        "top_p": limits.top_p,
    });
    if let Some(instructions) = &limits.instructions {
        body["instructions"] = Value::String(instructions.clone());
    }
    body
}

fn tool_outputs_body(outputs: &[ToolOutput]) -> Value {
    json!({
        "tool_outputs": outputs,
        "stream": true,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RunClient impl
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl RunClient for AgentServiceClient {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle> {
        let agent: AgentHandle = self.post_json("/assistants", &agent_body(spec)).await?;
        tracing::info!(agent_id = %agent.id, name = %spec.name, "agent created");
        Ok(agent)
    }

    async fn create_thread(&self) -> Result<ThreadHandle> {
        let thread: ThreadHandle = self.post_json("/threads", &json!({})).await?;
        tracing::info!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        attachments: &[MessageAttachment],
    ) -> Result<()> {
        let _: IdOnly = self
            .post_json(
                &format!("/threads/{thread_id}/messages"),
                &message_body(role, content, attachments),
            )
            .await?;
        Ok(())
    }

    async fn open_stream(
        &self,
        thread_id: &str,
        agent_id: &str,
        limits: &RunLimits,
    ) -> Result<RunStream> {
        self.post_stream(&format!("/threads/{thread_id}/runs"), &run_body(agent_id, limits))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream> {
        tracing::debug!(run_id, count = outputs.len(), "submitting tool outputs");
        self.post_stream(
            &format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
            &tool_outputs_body(&outputs),
        )
        .await
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.delete(&format!("/threads/{thread_id}")).await
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.delete(&format!("/assistants/{agent_id}")).await
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.delete(&format!("/files/{file_id}")).await
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        let list: FileList = self
            .send_json(self.request(reqwest::Method::GET, "/files"))
            .await?;
        Ok(list.data)
    }

    async fn upload_file(&self, path: &Path, purpose: FilePurpose) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("purpose", purpose.as_str())
            .part("file", part);

        let file: RemoteFile = self
            .send_json(self.request(reqwest::Method::POST, "/files").multipart(form))
            .await?;
        tracing::info!(file_id = %file.id, file_name = %file_name, "file uploaded");
        Ok(file)
    }

    async fn get_file_content(
        &self,
        file_id: &str,
    ) -> Result<BoxStream<'static, Result<Bytes>>> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/files/{file_id}/content"))
            .send()
            .await
            .map_err(from_reqwest)?;
        let resp = check_status(resp).await?;
        Ok(Box::pin(resp.bytes_stream().map(|c| c.map_err(from_reqwest))))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
