/// Shared error type used across all agent relay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// The remote agent service answered with a non-success status.
    #[error("remote {status}: {message}")]
    Remote { status: u16, message: String },

    /// The run event stream broke or ended unexpectedly.
    #[error("stream: {0}")]
    Stream(String),

    #[error("tool: {0}")]
    Tool(String),

    #[error("database: {0}")]
    Database(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
