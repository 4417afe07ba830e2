//! Where a turn's output goes.
//!
//! The engine never prints or serializes anything itself: it talks to a
//! [`UserSurface`]. The CLI uses [`ConsoleSurface`], the HTTP API and the
//! tests use [`ChannelSurface`].

pub mod auth;
pub mod channel;
pub mod console;
pub mod starters;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

pub use auth::{Authenticator, Identity};
pub use channel::{ChannelSurface, SurfaceEvent};
pub use console::ConsoleSurface;
pub use starters::{starters, Starter};

/// A file the agent produced, saved locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Image { name: String, path: PathBuf },
    File { name: String, path: PathBuf },
}

impl Element {
    pub fn name(&self) -> &str {
        match self {
            Element::Image { name, .. } | Element::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Element::Image { path, .. } | Element::File { path, .. } => path,
        }
    }
}

#[async_trait]
pub trait UserSurface: Send + Sync {
    /// Render one complete chat message.
    async fn send_text(&self, text: &str);

    /// Render a message made only of images / files.
    async fn send_elements(&self, elements: Vec<Element>);

    /// Open a side panel for a tool invocation (`name` is the tool kind,
    /// `language` drives syntax highlighting of the streamed input).
    async fn open_tool_step(&self, name: &str, language: &str) -> Box<dyn ToolStep>;
}

#[async_trait]
pub trait ToolStep: Send {
    async fn stream_token(&mut self, token: &str);

    async fn finish(&mut self);
}
