use std::io::Write;

use async_trait::async_trait;

use super::{Element, ToolStep, UserSurface};

/// Terminal rendering for `agentrelay chat` / `agentrelay run`.
///
/// Assistant text goes to stdout; tool steps and notices go dimmed to
/// stderr so piped output stays clean.
#[derive(Debug, Default, Clone)]
pub struct ConsoleSurface;

impl ConsoleSurface {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UserSurface for ConsoleSurface {
    async fn send_text(&self, text: &str) {
        println!("{text}");
        println!();
        std::io::stdout().flush().ok();
    }

    async fn send_elements(&self, elements: Vec<Element>) {
        for el in &elements {
            let tag = match el {
                Element::Image { .. } => "image",
                Element::File { .. } => "file",
            };
            eprintln!("\x1B[32m[{tag}] {} ({})\x1B[0m", el.name(), el.path().display());
        }
    }

    async fn open_tool_step(&self, name: &str, language: &str) -> Box<dyn ToolStep> {
        eprintln!("\x1B[2m[{name} ({language})]\x1B[0m");
        Box::new(ConsoleStep { open: true })
    }
}

struct ConsoleStep {
    open: bool,
}

#[async_trait]
impl ToolStep for ConsoleStep {
    async fn stream_token(&mut self, token: &str) {
        if self.open {
            eprint!("\x1B[2m{token}\x1B[0m");
            std::io::stderr().flush().ok();
        }
    }

    async fn finish(&mut self) {
        if std::mem::replace(&mut self.open, false) {
            eprintln!();
        }
    }
}
