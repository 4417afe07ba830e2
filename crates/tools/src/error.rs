use thiserror::Error;

/// Why a tool call could not produce an output.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}

impl ToolError {
    pub fn execution(tool: &str, message: impl Into<String>) -> Self {
        ToolError::Execution {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}
