use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent definition
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How the remote agent is created on the first turn of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model deployment name.
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_name")]
    pub name: String,
    /// Instruction template; `{database_schema_string}` is replaced with
    /// the sales database description before the agent is created.
    #[serde(default = "d_instructions_file")]
    pub instructions_file: PathBuf,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: d_model(),
            name: d_name(),
            instructions_file: d_instructions_file(),
            temperature: d_temperature(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-run sampling and token limits, plus the local stream watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "d_4096")]
    pub max_completion_tokens: u32,
    #[serde(default = "d_10240")]
    pub max_prompt_tokens: u32,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_top_p")]
    pub top_p: f32,
    /// Longest wait for the next stream event before the turn is treated
    /// as a transport failure.
    #[serde(default = "d_300")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_completion_tokens: 4096,
            max_prompt_tokens: 10240,
            temperature: d_temperature(),
            top_p: d_top_p(),
            stream_idle_timeout_secs: 300,
        }
    }
}

fn d_model() -> String {
    "gpt-4o".into()
}
fn d_name() -> String {
    "Contoso Sales AI Agent".into()
}
fn d_instructions_file() -> PathBuf {
    PathBuf::from("instructions/instructions_function_calling.txt")
}
fn d_temperature() -> f32 {
    0.1
}
fn d_top_p() -> f32 {
    0.1
}
fn d_4096() -> u32 {
    4096
}
fn d_10240() -> u32 {
    10240
}
fn d_300() -> u64 {
    300
}
