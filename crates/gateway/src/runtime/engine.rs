//! Run-event reconciliation.
//!
//! Consumes the event stream of one remote run (plus every continuation
//! stream produced by tool-output submission) and turns it into one
//! coherent, incrementally rendered turn on a [`UserSurface`].
//!
//! The remote service owns the run state machine. The engine only observes
//! it; the one transition it can cause is submitting tool outputs, which
//! yields a continuation stream that is pushed onto a queue and drained
//! after the current stream ends.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use ar_domain::attachment::RemoteFile;
use ar_domain::error::{Error, Result};
use ar_domain::event::{Citation, Run, RunEvent, RunStatus, StepToolCall, ThreadMessage};
use ar_domain::tool::ToolOutput;
use ar_remote::{RunClient, RunStream};
use ar_tools::ToolRegistry;
use futures_util::future::join_all;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;

use super::attachments::{AttachmentMediator, FileKind};
use super::cancel::CancelToken;
use crate::surface::{Element, ToolStep, UserSurface};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    pub output: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// What a completed turn rendered.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnSummary {
    /// Assistant text after citation rewriting.
    pub text: String,
    /// `[n] from <filename>` lines.
    pub citations: Vec<String>,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Agent-produced files saved locally.
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum TurnOutcome {
    Completed(TurnSummary),
    /// Stopped by the user; `partial` is the text assembled so far.
    Cancelled { partial: String },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-turn state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Streaming,
}

#[derive(Debug, Clone, Copy)]
enum StepKind {
    Function,
    CodeInterpreter,
}

impl StepKind {
    fn name(self) -> &'static str {
        match self {
            StepKind::Function => "function",
            StepKind::CodeInterpreter => "code_interpreter",
        }
    }

    fn language(self) -> &'static str {
        match self {
            StepKind::Function => "sql",
            StepKind::CodeInterpreter => "python",
        }
    }

    fn trailer(self) -> &'static str {
        match self {
            StepKind::Function => "\n\n",
            StepKind::CodeInterpreter => "\n",
        }
    }
}

/// A tool step panel kept open while its call streams input.
struct OpenStep {
    step: Box<dyn ToolStep>,
    kind: StepKind,
    /// Input shown so far (function arguments or sandbox code).
    body: String,
    finished: bool,
}

impl OpenStep {
    /// Show the part of a full snapshot not yet streamed.
    async fn show_snapshot(&mut self, full: &str) {
        if self.finished {
            return;
        }
        let Some(rest) = full.strip_prefix(self.body.as_str()) else {
            return;
        };
        if rest.is_empty() {
            return;
        }
        let rest = rest.to_string();
        self.step.stream_token(&rest).await;
        self.body.push_str(&rest);
    }

    async fn show_fragment(&mut self, fragment: &str) {
        if self.finished || fragment.is_empty() {
            return;
        }
        self.step.stream_token(fragment).await;
        self.body.push_str(fragment);
    }

    async fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.step.stream_token(self.kind.trailer()).await;
        self.step.finish().await;
    }
}

/// A file the agent produced, waiting for download at the end of the turn.
#[derive(Debug, Clone)]
struct AgentFile {
    file_id: String,
    annotation_name: String,
    kind: FileKind,
}

#[derive(Default)]
struct TurnState {
    phase: Phase,
    text: String,
    citations: Vec<Citation>,
    files: Vec<AgentFile>,
    pending: HashSet<String>,
    submitted: HashSet<String>,
    steps: HashMap<String, OpenStep>,
    /// (run step id, call index) → call id, for deltas that omit the id.
    step_calls: HashMap<(String, u32), String>,
    tool_calls: Vec<ToolCallRecord>,
}

impl TurnState {
    fn merge_message(&mut self, message: &ThreadMessage) {
        for citation in message.file_citations() {
            if !self.citations.contains(&citation) {
                self.citations.push(citation);
            }
        }

        let names = message.file_path_names();
        let images = message.image_file_ids();
        let (ids, kind) = if images.is_empty() {
            (
                message
                    .attachments
                    .iter()
                    .map(|a| a.file_id.clone())
                    .collect::<Vec<_>>(),
                FileKind::File,
            )
        } else {
            (images, FileKind::Image)
        };
        for (i, file_id) in ids.into_iter().enumerate() {
            if self.files.iter().any(|f| f.file_id == file_id) {
                continue;
            }
            self.files.push(AgentFile {
                file_id,
                annotation_name: names.get(i).cloned().unwrap_or_default(),
                kind,
            });
        }
    }
}

/// What to do after an event has been handled.
enum Flow {
    Continue,
    NextStream,
    Finished(TurnSummary),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Engine<'a> {
    client: &'a dyn RunClient,
    tools: &'a ToolRegistry,
    mediator: &'a AttachmentMediator,
    surface: &'a dyn UserSurface,
    thread_id: &'a str,
    idle_timeout: Duration,
    state: TurnState,
}

impl<'a> Engine<'a> {
    pub fn new(
        client: &'a dyn RunClient,
        tools: &'a ToolRegistry,
        mediator: &'a AttachmentMediator,
        surface: &'a dyn UserSurface,
        thread_id: &'a str,
    ) -> Self {
        Self {
            client,
            tools,
            mediator,
            surface,
            thread_id,
            idle_timeout: Duration::from_secs(300),
            state: TurnState::default(),
        }
    }

    /// Longest wait for the next event on any stream.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Drive `first` and every continuation stream to the terminal `Done`.
    ///
    /// Errors are transport failures: a stream error, an idle timeout, a
    /// failed submission, or the last stream ending without `Done`.
    pub async fn run(mut self, first: RunStream, cancel: &CancelToken) -> Result<TurnOutcome> {
        let mut queue: VecDeque<RunStream> = VecDeque::from([first]);

        while let Some(mut stream) = queue.pop_front() {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = tokio::time::timeout(self.idle_timeout, stream.next()) => Some(next),
                };
                let event = match next {
                    None => return Ok(self.cancelled()),
                    Some(Err(_)) => {
                        return Err(Error::Timeout(format!(
                            "no run event within {}s",
                            self.idle_timeout.as_secs()
                        )))
                    }
                    Some(Ok(None)) if queue.is_empty() => {
                        return Err(Error::Stream("run stream ended before done".into()))
                    }
                    Some(Ok(None)) => break,
                    Some(Ok(Some(event))) => event?,
                };

                tracing::trace!(kind = event.kind(), "run event");
                let handled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    flow = self.handle(event, &mut queue) => Some(flow),
                };
                match handled {
                    None => return Ok(self.cancelled()),
                    Some(flow) => match flow? {
                        Flow::Continue => {}
                        Flow::NextStream => break,
                        Flow::Finished(summary) => return Ok(TurnOutcome::Completed(summary)),
                    },
                }
            }
        }

        Err(Error::Stream("no run stream to drive".into()))
    }

    fn cancelled(self) -> TurnOutcome {
        tracing::info!(chars = self.state.text.len(), "turn cancelled");
        TurnOutcome::Cancelled {
            partial: self.state.text,
        }
    }

    async fn handle(&mut self, event: RunEvent, queue: &mut VecDeque<RunStream>) -> Result<Flow> {
        match event {
            RunEvent::MessageDelta(delta) => {
                if self.state.phase == Phase::Idle {
                    tracing::debug!("first assistant token");
                    self.state.phase = Phase::Streaming;
                }
                self.state.text.push_str(&delta.text());
            }
            RunEvent::ThreadMessage(message) => {
                tracing::debug!(message_id = %message.id, status = ?message.status, "thread message");
                self.state.merge_message(&message);
            }
            RunEvent::ThreadRun(run) => self.on_run(&run, queue).await?,
            RunEvent::RunStep(step) => {
                if let Some(details) = &step.step_details {
                    self.on_step_calls(&step.id, &details.tool_calls, true).await;
                    if matches!(
                        step.status.as_deref(),
                        Some("completed" | "failed" | "cancelled" | "expired")
                    ) {
                        for call in &details.tool_calls {
                            if let Some(open) = call.id().and_then(|id| self.state.steps.get_mut(id)) {
                                open.finish().await;
                            }
                        }
                    }
                }
            }
            RunEvent::RunStepDelta(delta) => {
                if let Some(details) = &delta.delta.step_details {
                    self.on_step_calls(&delta.id, &details.tool_calls, false).await;
                }
            }
            RunEvent::Error(message) => {
                tracing::warn!(%message, "run stream reported an error");
                self.surface
                    .send_text(&format!("The agent service reported an error: {message}"))
                    .await;
            }
            RunEvent::Done if !queue.is_empty() => {
                tracing::debug!(queued = queue.len(), "stream done, continuing");
                return Ok(Flow::NextStream);
            }
            RunEvent::Done => return Ok(Flow::Finished(self.finish().await)),
            RunEvent::Unhandled { kind, .. } => {
                tracing::debug!(%kind, "unhandled run event");
            }
        }
        Ok(Flow::Continue)
    }

    // ── Runs and tool calls ─────────────────────────────────────────

    async fn on_run(&mut self, run: &Run, queue: &mut VecDeque<RunStream>) -> Result<()> {
        tracing::debug!(run_id = %run.id, status = ?run.status, "run status");
        match run.status {
            RunStatus::RequiresAction => self.on_requires_action(run, queue).await,
            RunStatus::Failed => {
                let reason = run
                    .last_error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("unknown error");
                tracing::warn!(run_id = %run.id, %reason, "run failed");
                self.surface
                    .send_text(&format!("Run failed. Error: {reason}"))
                    .await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Execute every new call of one episode concurrently and submit all
    /// outputs in one batch.
    async fn on_requires_action(
        &mut self,
        run: &Run,
        queue: &mut VecDeque<RunStream>,
    ) -> Result<()> {
        let fresh: Vec<_> = run
            .required_tool_calls()
            .iter()
            .filter(|c| !self.state.pending.contains(&c.id) && !self.state.submitted.contains(&c.id))
            .cloned()
            .collect();
        if fresh.is_empty() {
            tracing::debug!(run_id = %run.id, "requires_action with no new calls, ignoring");
            return Ok(());
        }
        for call in &fresh {
            self.state.pending.insert(call.id.clone());
        }

        let tools = self.tools;
        let results = join_all(
            fresh
                .iter()
                .map(|c| tools.execute(&c.function.name, &c.function.arguments)),
        )
        .await;

        let mut outputs = Vec::with_capacity(fresh.len());
        for (call, result) in fresh.iter().zip(results) {
            let (output, is_error) = match result {
                Ok(value) => (output_text(value), false),
                Err(e) => {
                    tracing::warn!(call_id = %call.id, tool = %call.function.name, error = %e, "tool call failed");
                    self.surface
                        .send_text(&format!("Tool call failed: {e}"))
                        .await;
                    (serde_json::json!({ "error": e.to_string() }).to_string(), true)
                }
            };
            self.state.tool_calls.push(ToolCallRecord {
                call_id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
                output: output.clone(),
                is_error,
            });
            outputs.push(ToolOutput::new(&call.id, output));
        }

        tracing::info!(run_id = %run.id, outputs = outputs.len(), "submitting tool outputs");
        let continuation = self
            .client
            .submit_tool_outputs(self.thread_id, &run.id, outputs)
            .await?;
        for call in fresh {
            self.state.pending.remove(&call.id);
            self.state.submitted.insert(call.id);
        }
        queue.push_back(continuation);
        Ok(())
    }

    // ── Tool step panels ────────────────────────────────────────────

    async fn on_step_calls(&mut self, step_id: &str, calls: &[StepToolCall], snapshot: bool) {
        let surface = self.surface;
        for (pos, call) in calls.iter().enumerate() {
            let index = call.index().unwrap_or(pos as u32);
            let key = (step_id.to_string(), index);
            let call_id = match call.id() {
                Some(id) => {
                    self.state.step_calls.insert(key, id.to_string());
                    id.to_string()
                }
                None => match self.state.step_calls.get(&key) {
                    Some(id) => id.clone(),
                    None => continue,
                },
            };

            let (kind, header, body) = match call {
                StepToolCall::Function { function, .. } => {
                    let name = function
                        .as_ref()
                        .and_then(|f| f.name.as_deref())
                        .unwrap_or_default();
                    let args = function
                        .as_ref()
                        .and_then(|f| f.arguments.clone())
                        .unwrap_or_default();
                    (
                        StepKind::Function,
                        format!("Function Name: {name}\nFunction Arguments: "),
                        args,
                    )
                }
                StepToolCall::CodeInterpreter {
                    code_interpreter, ..
                } => (
                    StepKind::CodeInterpreter,
                    "Sandbox Code: ".to_string(),
                    code_interpreter
                        .as_ref()
                        .and_then(|c| c.input.clone())
                        .unwrap_or_default(),
                ),
                StepToolCall::FileSearch { .. } | StepToolCall::Other => continue,
            };

            if !self.state.steps.contains_key(&call_id) {
                let mut step = surface.open_tool_step(kind.name(), kind.language()).await;
                step.stream_token(&header).await;
                self.state.steps.insert(
                    call_id.clone(),
                    OpenStep {
                        step,
                        kind,
                        body: String::new(),
                        finished: false,
                    },
                );
            }
            if let Some(open) = self.state.steps.get_mut(&call_id) {
                if snapshot {
                    open.show_snapshot(&body).await;
                } else {
                    open.show_fragment(&body).await;
                }
            }
        }
    }

    // ── Terminal flush ──────────────────────────────────────────────

    async fn finish(&mut self) -> TurnSummary {
        for open in self.state.steps.values_mut() {
            open.finish().await;
        }

        let citations = std::mem::take(&mut self.state.citations);
        let mut lines = Vec::new();
        if !citations.is_empty() {
            match self.client.list_files().await {
                Ok(files) => {
                    let (text, resolved) = rewrite_citations(&self.state.text, &citations, &files);
                    self.state.text = text;
                    lines = resolved;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not list files, citations left as-is");
                }
            }
        }

        if !self.state.text.is_empty() {
            self.surface.send_text(&self.state.text).await;
        }
        if !lines.is_empty() {
            self.surface.send_text(&lines.join("\n")).await;
        }

        let mut elements = Vec::new();
        for file in std::mem::take(&mut self.state.files) {
            match self
                .mediator
                .download(&file.file_id, &file.annotation_name, file.kind)
                .await
            {
                Ok(path) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.file_id.clone());
                    elements.push(match file.kind {
                        FileKind::Image => Element::Image { name, path },
                        FileKind::File => Element::File { name, path },
                    });
                }
                Err(e) => {
                    tracing::warn!(file_id = %file.file_id, error = %e, "file download failed");
                }
            }
        }
        let files: Vec<PathBuf> = elements.iter().map(|e| e.path().clone()).collect();
        if !elements.is_empty() {
            self.surface.send_elements(elements).await;
        }

        tracing::info!(
            chars = self.state.text.len(),
            citations = lines.len(),
            files = files.len(),
            tool_calls = self.state.tool_calls.len(),
            "turn complete"
        );
        TurnSummary {
            text: std::mem::take(&mut self.state.text),
            citations: lines,
            tool_calls: std::mem::take(&mut self.state.tool_calls),
            files,
        }
    }
}

/// Replace each resolvable citation's literal text with `[n]`, where `n`
/// counts every citation whose file is known, in arrival order. A citation
/// whose text is absent from `text` keeps its number but is neither
/// replaced nor listed. Citations with an unknown file take no number.
pub fn rewrite_citations(
    text: &str,
    citations: &[Citation],
    files: &[RemoteFile],
) -> (String, Vec<String>) {
    let mut out = text.to_string();
    let mut lines = Vec::new();
    let mut n = 0;
    for citation in citations {
        let Some(file) = files.iter().find(|f| f.id == citation.file_id) else {
            tracing::debug!(file_id = %citation.file_id, "cited file not found");
            continue;
        };
        n += 1;
        if citation.text.is_empty() || !out.contains(&citation.text) {
            continue;
        }
        out = out.replace(&citation.text, &format!("[{n}]"));
        lines.push(format!("[{n}] from {}", file.filename));
    }
    (out, lines)
}

fn output_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cite(text: &str, file_id: &str) -> Citation {
        Citation {
            text: text.into(),
            file_id: file_id.into(),
        }
    }

    fn file(id: &str, name: &str) -> RemoteFile {
        RemoteFile {
            id: id.into(),
            filename: name.into(),
        }
    }

    #[test]
    fn citations_are_numbered_in_order() {
        let (text, lines) = rewrite_citations(
            "A says X Y",
            &[cite("X", "f1"), cite("Y", "f2")],
            &[file("f1", "doc1"), file("f2", "doc2")],
        );
        assert_eq!(text, "A says [1] [2]");
        assert_eq!(lines.join("\n"), "[1] from doc1\n[2] from doc2");
    }

    #[test]
    fn missing_citation_text_is_a_no_op() {
        let (text, lines) = rewrite_citations(
            "nothing cited here",
            &[cite("【4:0†source】", "f1")],
            &[file("f1", "doc1")],
        );
        assert_eq!(text, "nothing cited here");
        assert!(lines.is_empty());
    }

    #[test]
    fn unknown_file_takes_no_number() {
        let (text, lines) = rewrite_citations(
            "X Y",
            &[cite("X", "gone"), cite("Y", "f2")],
            &[file("f2", "doc2")],
        );
        assert_eq!(text, "X [1]");
        assert_eq!(lines, vec!["[1] from doc2".to_string()]);
    }

    #[test]
    fn absent_citation_text_still_takes_its_number() {
        let (text, lines) = rewrite_citations(
            "A X Y",
            &[cite("X", "f1"), cite("Z", "f2"), cite("Y", "f3")],
            &[file("f1", "doc1"), file("f2", "doc2"), file("f3", "doc3")],
        );
        assert_eq!(text, "A [1] [3]");
        assert_eq!(lines.join("\n"), "[1] from doc1\n[3] from doc3");
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let (text, _) = rewrite_citations("X and X", &[cite("X", "f1")], &[file("f1", "d")]);
        assert_eq!(text, "[1] and [1]");
    }

    #[test]
    fn string_outputs_are_not_requoted() {
        assert_eq!(output_text(Value::String("rows".into())), "rows");
        assert_eq!(output_text(serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }
}
