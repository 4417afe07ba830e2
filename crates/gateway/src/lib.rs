//! agentrelay gateway: reconciles remote agent runs into chat turns and
//! serves them over HTTP/SSE and the terminal.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
pub mod surface;
