use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tools
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which tools the agent is created with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Local read-only SQL function over the sales database.
    #[serde(default = "d_true")]
    pub sales_query: bool,
    /// Hosted code interpreter.
    #[serde(default = "d_true")]
    pub code_interpreter: bool,
    /// Hosted file search over uploaded attachments.
    #[serde(default = "d_true")]
    pub file_search: bool,
    /// Bing grounding connection id; grounding is disabled when unset.
    #[serde(default)]
    pub bing_connection_id: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            sales_query: true,
            code_interpreter: true,
            file_search: true,
            bing_connection_id: None,
        }
    }
}

/// Local SQLite sales database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "d_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: d_db_path() }
    }
}

/// Where agent-produced files are saved, and where HTTP clients may pick
/// attachments from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    #[serde(default = "d_download_dir")]
    pub download_dir: PathBuf,
    /// HTTP chat requests name attachments relative to this directory and
    /// cannot reach outside it. The CLI is not restricted.
    #[serde(default = "d_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            download_dir: d_download_dir(),
            upload_dir: d_upload_dir(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_db_path() -> PathBuf {
    PathBuf::from("database/contoso-sales.db")
}
fn d_download_dir() -> PathBuf {
    PathBuf::from("files")
}
fn d_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}
