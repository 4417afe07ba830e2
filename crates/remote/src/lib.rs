//! Client side of the remote agent service.
//!
//! [`RunClient`] is the contract the turn engine is written against; the
//! [`AgentServiceClient`] implements it over the service's REST + SSE API.

pub mod client;
pub mod traits;
pub(crate) mod sse;
pub(crate) mod util;
pub mod wire;

pub use client::AgentServiceClient;
pub use traits::{AgentHandle, AgentSpec, Role, RunClient, RunLimits, RunStream, ThreadHandle};
