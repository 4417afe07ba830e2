//! Run events observed on a remote agent run.
//!
//! The remote service owns the run state machine; everything in here is a
//! read-only view of what it reports. Payload structs mirror the wire JSON
//! closely enough to deserialize it directly, with every optional field
//! defaulted so partial and future payloads still parse.

use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::attachment::MessageAttachment;

/// A boxed async stream, used for run event streams and file downloads.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RunEvent — the tagged union consumed by the reconciliation engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One event from a run stream.
///
/// Within one kind events arrive in causal order; across kinds there is no
/// ordering guarantee (a run step for a tool call may show up before or
/// after the requires-action notification for the same call id).
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Incremental assistant text.
    MessageDelta(MessageDelta),
    /// A message snapshot (created / in progress / completed).
    ThreadMessage(ThreadMessage),
    /// A run status transition.
    ThreadRun(Run),
    /// A run step snapshot (message creation or tool calls).
    RunStep(RunStep),
    /// Incremental run step details (e.g. code interpreter input).
    RunStepDelta(RunStepDelta),
    /// An error reported in-band by the remote service.
    Error(String),
    /// The stream is complete.
    Done,
    /// An event kind this client does not understand.
    Unhandled {
        kind: String,
        data: serde_json::Value,
    },
}

impl RunEvent {
    /// Short kind label, used for logging.
    pub fn kind(&self) -> &str {
        match self {
            RunEvent::MessageDelta(_) => "message-delta",
            RunEvent::ThreadMessage(_) => "thread-message",
            RunEvent::ThreadRun(_) => "thread-run",
            RunEvent::RunStep(_) => "run-step",
            RunEvent::RunStepDelta(_) => "run-step-delta",
            RunEvent::Error(_) => "error",
            RunEvent::Done => "done",
            RunEvent::Unhandled { kind, .. } => kind,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Runs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Cancelled,
    Failed,
    Completed,
    Expired,
    Incomplete,
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether the remote run has stopped for good. A terminal status is
    /// NOT the end of a turn: the stream's `done` event is.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled
                | RunStatus::Failed
                | RunStatus::Completed
                | RunStatus::Expired
                | RunStatus::Incomplete
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

impl Run {
    /// Function calls the run is blocked on, if it requires action.
    pub fn required_tool_calls(&self) -> &[RequiredToolCall] {
        if self.status != RunStatus::RequiresAction {
            return &[];
        }
        self.required_action
            .as_ref()
            .and_then(|a| a.submit_tool_outputs.as_ref())
            .map(|s| s.tool_calls.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<RequiredToolCall>,
}

/// A pending function call from a requires-action payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON argument string, exactly as the model produced it.
    #[serde(default)]
    pub arguments: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDelta {
    pub id: String,
    #[serde(default)]
    pub delta: MessageDeltaBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    #[serde(default)]
    pub content: Vec<MessageDeltaContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageDeltaContent {
    Text {
        #[serde(default)]
        index: u32,
        text: DeltaText,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeltaText {
    #[serde(default)]
    pub value: Option<String>,
}

impl MessageDelta {
    /// The text carried by this delta (all text parts, in order).
    pub fn text(&self) -> String {
        self.delta
            .content
            .iter()
            .filter_map(|c| match c {
                MessageDeltaContent::Text { text, .. } => text.value.as_deref(),
                MessageDeltaContent::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    ImageFile { image_file: FileRef },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Annotation {
    /// A quote from a searched file, rewritten to `[n]` on flush.
    FileCitation { text: String, file_citation: FileRef },
    /// A sandbox path to a file the agent produced.
    FilePath { text: String, file_path: FileRef },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

/// A citation annotation reduced to what the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Citation {
    pub text: String,
    pub file_id: String,
}

impl ThreadMessage {
    fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.content.iter().flat_map(|c| match c {
            MessageContent::Text { text } => text.annotations.as_slice(),
            _ => &[],
        })
    }

    /// File citation annotations in the order they appear.
    pub fn file_citations(&self) -> Vec<Citation> {
        self.annotations()
            .filter_map(|a| match a {
                Annotation::FileCitation { text, file_citation } => Some(Citation {
                    text: text.clone(),
                    file_id: file_citation.file_id.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Literal texts of `file_path` annotations (e.g. `sandbox:/mnt/data/chart.png`).
    pub fn file_path_names(&self) -> Vec<String> {
        self.annotations()
            .filter_map(|a| match a {
                Annotation::FilePath { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// File ids of inline images.
    pub fn image_file_ids(&self) -> Vec<String> {
        self.content
            .iter()
            .filter_map(|c| match c {
                MessageContent::ImageFile { image_file } => Some(image_file.file_id.clone()),
                _ => None,
            })
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run steps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub id: String,
    #[serde(default)]
    pub run_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDetails {
    #[serde(default)]
    pub tool_calls: Vec<StepToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStepDelta {
    pub id: String,
    #[serde(default)]
    pub delta: RunStepDeltaBody,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStepDeltaBody {
    #[serde(default)]
    pub step_details: Option<StepDetails>,
}

/// A tool call inside a run step. Deltas may omit the id after the first
/// chunk and identify the call by `index` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepToolCall {
    Function {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        index: Option<u32>,
        #[serde(default)]
        function: Option<StepFunction>,
    },
    CodeInterpreter {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        index: Option<u32>,
        #[serde(default)]
        code_interpreter: Option<CodeInterpreterCall>,
    },
    FileSearch {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        index: Option<u32>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeInterpreterCall {
    #[serde(default)]
    pub input: Option<String>,
}

impl StepToolCall {
    pub fn id(&self) -> Option<&str> {
        match self {
            StepToolCall::Function { id, .. }
            | StepToolCall::CodeInterpreter { id, .. }
            | StepToolCall::FileSearch { id, .. } => id.as_deref(),
            StepToolCall::Other => None,
        }
    }

    pub fn index(&self) -> Option<u32> {
        match self {
            StepToolCall::Function { index, .. }
            | StepToolCall::CodeInterpreter { index, .. }
            | StepToolCall::FileSearch { index, .. } => *index,
            StepToolCall::Other => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_delta_concatenates_text_parts() {
        let delta: MessageDelta = serde_json::from_value(json!({
            "id": "msg_1",
            "delta": { "content": [
                { "index": 0, "type": "text", "text": { "value": "Hel" } },
                { "index": 1, "type": "image_file", "image_file": { "file_id": "f" } },
                { "index": 2, "type": "text", "text": { "value": "lo" } }
            ]}
        }))
        .unwrap();
        assert_eq!(delta.text(), "Hello");
    }

    #[test]
    fn requires_action_run_exposes_tool_calls() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "thread_id": "thread_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": { "tool_calls": [
                    { "id": "call_1", "type": "function",
                      "function": { "name": "q", "arguments": "{\"a\":1}" } }
                ]}
            }
        }))
        .unwrap();
        let calls = run.required_tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.arguments, "{\"a\":1}");
    }

    #[test]
    fn tool_calls_ignored_unless_requires_action() {
        let run: Run = serde_json::from_value(json!({
            "id": "run_1",
            "status": "completed",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": { "tool_calls": [
                    { "id": "call_1", "function": { "name": "q", "arguments": "{}" } }
                ]}
            }
        }))
        .unwrap();
        assert!(run.required_tool_calls().is_empty());
        assert!(run.status.is_terminal());
    }

    #[test]
    fn unknown_run_status_parses() {
        let run: Run = serde_json::from_value(json!({ "id": "r", "status": "paused_forever" })).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);
        assert!(!run.status.is_terminal());
    }

    #[test]
    fn thread_message_extracts_citations_images_and_paths() {
        let msg: ThreadMessage = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [
                { "type": "text", "text": { "value": "see X", "annotations": [
                    { "type": "file_citation", "text": "X", "file_citation": { "file_id": "doc1" } },
                    { "type": "file_path", "text": "sandbox:/mnt/data/sales.xlsx", "file_path": { "file_id": "f2" } },
                    { "type": "url_citation", "text": "u" }
                ]}},
                { "type": "image_file", "image_file": { "file_id": "img1" } }
            ]
        }))
        .unwrap();
        assert_eq!(
            msg.file_citations(),
            vec![Citation { text: "X".into(), file_id: "doc1".into() }]
        );
        assert_eq!(msg.file_path_names(), vec!["sandbox:/mnt/data/sales.xlsx"]);
        assert_eq!(msg.image_file_ids(), vec!["img1"]);
    }

    #[test]
    fn step_tool_call_variants_parse() {
        let details: StepDetails = serde_json::from_value(json!({
            "tool_calls": [
                { "id": "c1", "type": "code_interpreter", "code_interpreter": { "input": "print(1)" } },
                { "index": 1, "type": "function", "function": { "name": "q" } },
                { "type": "bing_grounding", "id": "b1" }
            ]
        }))
        .unwrap();
        assert_eq!(details.tool_calls[0].id(), Some("c1"));
        assert_eq!(details.tool_calls[1].index(), Some(1));
        assert!(matches!(details.tool_calls[2], StepToolCall::Other));
    }
}
