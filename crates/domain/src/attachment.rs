use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::AgentTool;

/// Why a file was uploaded to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePurpose {
    /// Indexed for agent file search.
    #[serde(rename = "assistants")]
    Agents,
    #[serde(rename = "assistants_output")]
    AgentsOutput,
}

impl FilePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            FilePurpose::Agents => "assistants",
            FilePurpose::AgentsOutput => "assistants_output",
        }
    }
}

/// A file stored by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub filename: String,
}

/// A user file uploaded before a turn. Referenced by every later message
/// in the session until the session is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedAttachment {
    pub local_path: PathBuf,
    pub file_id: String,
    pub purpose: FilePurpose,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedAttachment {
    /// The reference posted alongside a message so file search can use it.
    pub fn as_message_attachment(&self) -> MessageAttachment {
        MessageAttachment {
            file_id: self.file_id.clone(),
            tools: vec![AgentTool::FileSearch],
        }
    }
}

/// A file reference carried by a thread message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub file_id: String,
    #[serde(default)]
    pub tools: Vec<AgentTool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_attachment_references_file_search() {
        let up = UploadedAttachment {
            local_path: PathBuf::from("datasheet.pdf"),
            file_id: "file-1".into(),
            purpose: FilePurpose::Agents,
            uploaded_at: Utc::now(),
        };
        let att = up.as_message_attachment();
        assert_eq!(att.file_id, "file-1");
        assert_eq!(att.tools, vec![AgentTool::FileSearch]);
    }

    #[test]
    fn purpose_wire_names() {
        assert_eq!(FilePurpose::Agents.as_str(), "assistants");
        assert_eq!(
            serde_json::to_string(&FilePurpose::Agents).unwrap(),
            "\"assistants\""
        );
    }
}
