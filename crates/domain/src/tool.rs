use serde::{Deserialize, Serialize};

/// Function tool definition exposed to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// The result (or error text) for one tool call, submitted back to the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

impl ToolOutput {
    pub fn new(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: output.into(),
        }
    }
}

/// A tool declaration attached to an agent (or to a message attachment).
///
/// `Function` tools run locally and come back as requires-action episodes;
/// the others are hosted by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentTool {
    Function { function: ToolDefinition },
    CodeInterpreter,
    FileSearch,
    BingGrounding { bing_grounding: BingGrounding },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingGrounding {
    pub connections: Vec<BingConnection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingConnection {
    pub connection_id: String,
}

impl AgentTool {
    pub fn function(def: ToolDefinition) -> Self {
        AgentTool::Function { function: def }
    }

    pub fn bing_grounding(connection_id: impl Into<String>) -> Self {
        AgentTool::BingGrounding {
            bing_grounding: BingGrounding {
                connections: vec![BingConnection {
                    connection_id: connection_id.into(),
                }],
            },
        }
    }
}
