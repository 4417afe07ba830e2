//! Shared types for the agent relay: remote run events, tool calls and
//! outputs, attachments, configuration and the common error type.

pub mod attachment;
pub mod config;
pub mod error;
pub mod event;
pub mod tool;

pub use error::{Error, Result};
