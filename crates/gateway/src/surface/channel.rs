use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use super::{Element, ToolStep, UserSurface};

/// Serializable surface output, one per rendered action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    Text { content: String },
    Elements { elements: Vec<Element> },
    ToolStepOpened { step_id: String, name: String, language: String },
    ToolStepToken { step_id: String, token: String },
    ToolStepFinished { step_id: String },
}

impl SurfaceEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceEvent::Text { .. } => "text",
            SurfaceEvent::Elements { .. } => "elements",
            SurfaceEvent::ToolStepOpened { .. } => "tool_step_opened",
            SurfaceEvent::ToolStepToken { .. } => "tool_step_token",
            SurfaceEvent::ToolStepFinished { .. } => "tool_step_finished",
        }
    }
}

/// Forwards every surface action as a [`SurfaceEvent`] on an mpsc channel.
///
/// A closed receiver (client went away) is not an error for the turn; the
/// events are dropped.
#[derive(Clone)]
pub struct ChannelSurface {
    tx: mpsc::Sender<SurfaceEvent>,
}

impl ChannelSurface {
    pub fn new(tx: mpsc::Sender<SurfaceEvent>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<SurfaceEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }

    async fn emit(tx: &mpsc::Sender<SurfaceEvent>, event: SurfaceEvent) {
        if tx.send(event).await.is_err() {
            tracing::debug!("surface receiver closed, dropping event");
        }
    }
}

#[async_trait]
impl UserSurface for ChannelSurface {
    async fn send_text(&self, text: &str) {
        Self::emit(
            &self.tx,
            SurfaceEvent::Text {
                content: text.to_string(),
            },
        )
        .await;
    }

    async fn send_elements(&self, elements: Vec<Element>) {
        Self::emit(&self.tx, SurfaceEvent::Elements { elements }).await;
    }

    async fn open_tool_step(&self, name: &str, language: &str) -> Box<dyn ToolStep> {
        let step_id = uuid::Uuid::new_v4().to_string();
        Self::emit(
            &self.tx,
            SurfaceEvent::ToolStepOpened {
                step_id: step_id.clone(),
                name: name.to_string(),
                language: language.to_string(),
            },
        )
        .await;
        Box::new(ChannelStep {
            step_id,
            tx: self.tx.clone(),
            finished: false,
        })
    }
}

struct ChannelStep {
    step_id: String,
    tx: mpsc::Sender<SurfaceEvent>,
    finished: bool,
}

#[async_trait]
impl ToolStep for ChannelStep {
    async fn stream_token(&mut self, token: &str) {
        if self.finished || token.is_empty() {
            return;
        }
        ChannelSurface::emit(
            &self.tx,
            SurfaceEvent::ToolStepToken {
                step_id: self.step_id.clone(),
                token: token.to_string(),
            },
        )
        .await;
    }

    async fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        ChannelSurface::emit(
            &self.tx,
            SurfaceEvent::ToolStepFinished {
                step_id: self.step_id.clone(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tool_step_events_share_an_id() {
        let (surface, mut rx) = ChannelSurface::channel(16);
        let mut step = surface.open_tool_step("function", "sql").await;
        step.stream_token("SELECT 1").await;
        step.stream_token("").await;
        step.finish().await;
        step.finish().await;
        drop(step);
        drop(surface);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.len(), 3);
        let SurfaceEvent::ToolStepOpened { step_id, language, .. } = &events[0] else {
            panic!("expected opened, got {:?}", events[0]);
        };
        assert_eq!(language, "sql");
        assert_eq!(
            events[1],
            SurfaceEvent::ToolStepToken {
                step_id: step_id.clone(),
                token: "SELECT 1".into()
            }
        );
        assert_eq!(
            events[2],
            SurfaceEvent::ToolStepFinished {
                step_id: step_id.clone()
            }
        );
    }

    #[tokio::test]
    async fn closed_receiver_is_ignored() {
        let (surface, rx) = ChannelSurface::channel(1);
        drop(rx);
        surface.send_text("nobody listening").await;
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(SurfaceEvent::Text {
            content: "hi".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["content"], "hi");
    }
}
