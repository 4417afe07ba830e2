//! Scripted fake of the remote agent service plus event builders.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ar_domain::attachment::{FilePurpose, MessageAttachment, RemoteFile};
use ar_domain::error::{Error, Result};
use ar_domain::event::{BoxStream, RunEvent};
use ar_domain::tool::{ToolDefinition, ToolOutput};
use ar_gateway::surface::{ChannelSurface, SurfaceEvent};
use ar_remote::{AgentHandle, AgentSpec, RunClient, RunLimits, Role, RunStream, ThreadHandle};
use ar_tools::{ToolError, ToolHandler};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fake client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One stream handed out by `open_stream` / `submit_tool_outputs`.
pub enum Script {
    /// Yields the events, then ends.
    Events(Vec<RunEvent>),
    /// Yields the events, then never yields again.
    Hang(Vec<RunEvent>),
    /// The call itself fails.
    Fail(String),
}

#[derive(Default)]
pub struct FakeClient {
    scripts: Mutex<VecDeque<Script>>,
    pub files: Mutex<Vec<RemoteFile>>,
    pub contents: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_uploads: Mutex<bool>,
    pub fail_create_agent: Mutex<bool>,
    pub fail_post: Mutex<bool>,
    /// When set, `create_agent` waits for a permit before answering.
    pub agent_gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
    pub agent_requests: Mutex<usize>,
    /// Downloads yield their first half, then fail.
    pub break_downloads: Mutex<bool>,

    pub agents: Mutex<Vec<AgentSpec>>,
    pub threads: Mutex<usize>,
    pub posts: Mutex<Vec<(String, Vec<MessageAttachment>)>>,
    pub opened: Mutex<Vec<RunLimits>>,
    pub submissions: Mutex<Vec<(String, Vec<ToolOutput>)>>,
    pub uploads: Mutex<Vec<PathBuf>>,
    pub deleted_files: Mutex<Vec<String>>,
    pub deleted_threads: Mutex<Vec<String>>,
    pub deleted_agents: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        let client = Self::default();
        *client.scripts.lock() = scripts.into();
        Arc::new(client)
    }

    pub fn push_script(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    pub fn with_file(&self, id: &str, filename: &str, content: &[u8]) {
        self.files.lock().push(RemoteFile {
            id: id.into(),
            filename: filename.into(),
        });
        self.contents.lock().insert(id.into(), content.to_vec());
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submissions
            .lock()
            .iter()
            .flat_map(|(_, outs)| outs.iter().map(|o| o.tool_call_id.clone()))
            .collect()
    }

    fn next_stream(&self) -> Result<RunStream> {
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("no scripted stream left".into()))?;
        match script {
            Script::Events(events) => Ok(stream_of(events)),
            Script::Hang(events) => Ok(hanging(events)),
            Script::Fail(message) => Err(Error::Remote {
                status: 500,
                message,
            }),
        }
    }
}

#[async_trait]
impl RunClient for FakeClient {
    async fn create_agent(&self, spec: &AgentSpec) -> Result<AgentHandle> {
        *self.agent_requests.lock() += 1;
        let gate = self.agent_gate.lock().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        if *self.fail_create_agent.lock() {
            return Err(Error::Remote {
                status: 400,
                message: "model not deployed".into(),
            });
        }
        let mut agents = self.agents.lock();
        agents.push(spec.clone());
        Ok(AgentHandle {
            id: format!("asst_{}", agents.len()),
            name: Some(spec.name.clone()),
        })
    }

    async fn create_thread(&self) -> Result<ThreadHandle> {
        let mut n = self.threads.lock();
        *n += 1;
        Ok(ThreadHandle {
            id: format!("thread_{n}"),
        })
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: Role,
        content: &str,
        attachments: &[MessageAttachment],
    ) -> Result<()> {
        assert_eq!(role, Role::User);
        if *self.fail_post.lock() {
            return Err(Error::Http("connection reset".into()));
        }
        self.posts
            .lock()
            .push((format!("{thread_id}:{content}"), attachments.to_vec()));
        Ok(())
    }

    async fn open_stream(
        &self,
        _thread_id: &str,
        _agent_id: &str,
        limits: &RunLimits,
    ) -> Result<RunStream> {
        self.opened.lock().push(limits.clone());
        self.next_stream()
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<RunStream> {
        self.submissions.lock().push((run_id.to_string(), outputs));
        self.next_stream()
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        self.deleted_threads.lock().push(thread_id.into());
        Ok(())
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.deleted_agents.lock().push(agent_id.into());
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.deleted_files.lock().push(file_id.into());
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<RemoteFile>> {
        Ok(self.files.lock().clone())
    }

    async fn upload_file(&self, path: &Path, purpose: FilePurpose) -> Result<RemoteFile> {
        assert_eq!(purpose, FilePurpose::Agents);
        if *self.fail_uploads.lock() {
            return Err(Error::Remote {
                status: 413,
                message: "file too large".into(),
            });
        }
        let mut uploads = self.uploads.lock();
        uploads.push(path.to_path_buf());
        Ok(RemoteFile {
            id: format!("upload-{}", uploads.len()),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }

    async fn get_file_content(&self, file_id: &str) -> Result<BoxStream<'static, Result<Bytes>>> {
        let content = self
            .contents
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| Error::Remote {
                status: 404,
                message: format!("no file {file_id}"),
            })?;
        let (a, b) = content.split_at(content.len() / 2);
        let second = if *self.break_downloads.lock() {
            Err(Error::Http("connection reset".into()))
        } else {
            Ok(Bytes::copy_from_slice(b))
        };
        let chunks = vec![Ok(Bytes::copy_from_slice(a)), second];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn stream_of(events: Vec<RunEvent>) -> RunStream {
    Box::pin(futures_util::stream::iter(events.into_iter().map(Ok)))
}

/// Yields `events`, then stays open without ever yielding again.
pub fn hanging(events: Vec<RunEvent>) -> RunStream {
    use futures_util::StreamExt;
    Box::pin(
        futures_util::stream::iter(events.into_iter().map(Ok))
            .chain(futures_util::stream::pending()),
    )
}

pub fn delta(text: &str) -> RunEvent {
    RunEvent::MessageDelta(
        serde_json::from_value(json!({
            "id": "msg_1",
            "delta": { "content": [ { "index": 0, "type": "text", "text": { "value": text } } ] }
        }))
        .unwrap(),
    )
}

pub fn run_status(run_id: &str, status: &str) -> RunEvent {
    RunEvent::ThreadRun(
        serde_json::from_value(json!({ "id": run_id, "thread_id": "thread_1", "status": status }))
            .unwrap(),
    )
}

pub fn run_failed(run_id: &str, message: &str) -> RunEvent {
    RunEvent::ThreadRun(
        serde_json::from_value(json!({
            "id": run_id,
            "status": "failed",
            "last_error": { "code": "server_error", "message": message }
        }))
        .unwrap(),
    )
}

/// `calls`: (call id, function name, raw argument string).
pub fn requires_action(run_id: &str, calls: &[(&str, &str, &str)]) -> RunEvent {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({ "id": id, "type": "function", "function": { "name": name, "arguments": args } })
        })
        .collect();
    RunEvent::ThreadRun(
        serde_json::from_value(json!({
            "id": run_id,
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": { "tool_calls": tool_calls }
            }
        }))
        .unwrap(),
    )
}

/// A completed assistant message carrying `citations` (text, file id).
pub fn message_with_citations(text: &str, citations: &[(&str, &str)]) -> RunEvent {
    let annotations: Vec<Value> = citations
        .iter()
        .map(|(t, f)| json!({ "type": "file_citation", "text": t, "file_citation": { "file_id": f } }))
        .collect();
    RunEvent::ThreadMessage(
        serde_json::from_value(json!({
            "id": "msg_1",
            "status": "completed",
            "content": [ { "type": "text", "text": { "value": text, "annotations": annotations } } ]
        }))
        .unwrap(),
    )
}

/// A completed assistant message with one inline image and its sandbox path.
pub fn message_with_image(file_id: &str, sandbox_path: &str) -> RunEvent {
    RunEvent::ThreadMessage(
        serde_json::from_value(json!({
            "id": "msg_2",
            "status": "completed",
            "content": [
                { "type": "image_file", "image_file": { "file_id": file_id } },
                { "type": "text", "text": { "value": "Here is the chart.", "annotations": [
                    { "type": "file_path", "text": sandbox_path, "file_path": { "file_id": file_id } }
                ]}}
            ]
        }))
        .unwrap(),
    )
}

pub fn code_step(step_id: &str, call_id: &str, input: &str, status: &str) -> RunEvent {
    RunEvent::RunStep(
        serde_json::from_value(json!({
            "id": step_id,
            "run_id": "run_1",
            "type": "tool_calls",
            "status": status,
            "step_details": { "tool_calls": [
                { "id": call_id, "type": "code_interpreter", "code_interpreter": { "input": input } }
            ]}
        }))
        .unwrap(),
    )
}

pub fn code_step_delta(step_id: &str, index: u32, input: &str) -> RunEvent {
    RunEvent::RunStepDelta(
        serde_json::from_value(json!({
            "id": step_id,
            "delta": { "step_details": { "tool_calls": [
                { "index": index, "type": "code_interpreter", "code_interpreter": { "input": input } }
            ]}}
        }))
        .unwrap(),
    )
}

pub fn function_step(step_id: &str, call_id: &str, name: &str, args: &str, status: &str) -> RunEvent {
    RunEvent::RunStep(
        serde_json::from_value(json!({
            "id": step_id,
            "run_id": "run_1",
            "type": "tool_calls",
            "status": status,
            "step_details": { "tool_calls": [
                { "id": call_id, "index": 0, "type": "function", "function": { "name": name, "arguments": args } }
            ]}
        }))
        .unwrap(),
    )
}

pub fn unhandled(kind: &str) -> RunEvent {
    RunEvent::Unhandled {
        kind: kind.into(),
        data: json!({}),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A small `sales_data` table: EUROPE 300.0 over two rows, AFRICA 50.5.
pub fn seed_sales(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE sales_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            main_category TEXT,
            product_type TEXT,
            region TEXT,
            year INTEGER,
            revenue REAL
        );
        INSERT INTO sales_data (main_category, product_type, region, year, revenue) VALUES
            ('CLIMBING', 'HARNESSES', 'EUROPE', 2023, 100.0),
            ('CLIMBING', 'ROPES', 'AFRICA', 2024, 50.5),
            ('CAMPING', 'TENTS', 'EUROPE', 2024, 200.0);",
    )
    .unwrap();
}


fn definition(name: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: format!("test tool {name}"),
        parameters: json!({ "type": "object" }),
    }
}

/// Returns its arguments back as `{"echo": args}`.
pub struct EchoTool(ToolDefinition);

impl EchoTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self(definition(name)))
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.0
    }

    async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
        Ok(json!({ "echo": args }))
    }
}

/// Always fails.
pub struct BrokenTool(ToolDefinition);

impl BrokenTool {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self(definition(name)))
    }
}

#[async_trait]
impl ToolHandler for BrokenTool {
    fn definition(&self) -> &ToolDefinition {
        &self.0
    }

    async fn call(&self, _args: Value) -> std::result::Result<Value, ToolError> {
        Err(ToolError::execution(&self.0.name, "database is on fire"))
    }
}

/// Completes only once `n` calls are in flight together.
pub struct RendezvousTool {
    def: ToolDefinition,
    barrier: tokio::sync::Barrier,
}

impl RendezvousTool {
    pub fn new(name: &str, n: usize) -> Arc<Self> {
        Arc::new(Self {
            def: definition(name),
            barrier: tokio::sync::Barrier::new(n),
        })
    }
}

#[async_trait]
impl ToolHandler for RendezvousTool {
    fn definition(&self) -> &ToolDefinition {
        &self.def
    }

    async fn call(&self, _args: Value) -> std::result::Result<Value, ToolError> {
        self.barrier.wait().await;
        Ok(Value::String("met".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Surface helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn surface() -> (ChannelSurface, mpsc::Receiver<SurfaceEvent>) {
    ChannelSurface::channel(1024)
}

/// Everything emitted so far.
pub fn drain(rx: &mut mpsc::Receiver<SurfaceEvent>) -> Vec<SurfaceEvent> {
    let mut events = Vec::new();
    while let Ok(e) = rx.try_recv() {
        events.push(e);
    }
    events
}

/// The `Text` messages, in order.
pub fn texts(events: &[SurfaceEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SurfaceEvent::Text { content } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

/// Concatenated tokens of every tool step, by step name.
pub fn tool_steps(events: &[SurfaceEvent]) -> Vec<(String, String, String)> {
    let mut steps: Vec<(String, String, String, String)> = Vec::new();
    for e in events {
        match e {
            SurfaceEvent::ToolStepOpened {
                step_id,
                name,
                language,
            } => steps.push((step_id.clone(), name.clone(), language.clone(), String::new())),
            SurfaceEvent::ToolStepToken { step_id, token } => {
                if let Some(s) = steps.iter_mut().find(|s| &s.0 == step_id) {
                    s.3.push_str(token);
                }
            }
            _ => {}
        }
    }
    steps.into_iter().map(|(_, n, l, b)| (n, l, b)).collect()
}
