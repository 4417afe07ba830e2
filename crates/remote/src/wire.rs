//! Mapping from SSE event names and payloads to [`RunEvent`].

use ar_domain::event::RunEvent;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Turn one SSE frame into a [`RunEvent`].
///
/// Unknown event names and payloads that fail to decode become
/// [`RunEvent::Unhandled`] so that protocol additions never break a turn.
pub fn parse_frame(event: Option<&str>, data: &str) -> RunEvent {
    if data == "[DONE]" || event == Some("done") {
        return RunEvent::Done;
    }

    let name = event.unwrap_or("message");
    match name {
        "thread.message.delta" => decode(name, data, RunEvent::MessageDelta),
        "thread.run.step.delta" => decode(name, data, RunEvent::RunStepDelta),
        "error" => RunEvent::Error(error_message(data)),
        n if n.starts_with("thread.run.step.") => decode(name, data, RunEvent::RunStep),
        n if n.starts_with("thread.message.") => decode(name, data, RunEvent::ThreadMessage),
        n if n.starts_with("thread.run.") => decode(name, data, RunEvent::ThreadRun),
        _ => unhandled(name, data),
    }
}

fn decode<T, F>(name: &str, data: &str, wrap: F) -> RunEvent
where
    T: DeserializeOwned,
    F: FnOnce(T) -> RunEvent,
{
    match serde_json::from_str::<T>(data) {
        Ok(v) => wrap(v),
        Err(e) => {
            tracing::warn!(event = name, error = %e, "malformed run event payload");
            unhandled(name, data)
        }
    }
}

fn unhandled(name: &str, data: &str) -> RunEvent {
    let data = serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()));
    RunEvent::Unhandled {
        kind: name.to_string(),
        data,
    }
}

fn error_message(data: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(data).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.pointer("/error/message"))
                .and_then(|m| m.as_str())
        })
        .map(String::from)
        .unwrap_or_else(|| data.to_string())
}
