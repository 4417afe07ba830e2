//! Turn runtime: the reconciliation engine, the orchestrator around it, and
//! the per-session bookkeeping both rely on.
//!
//! Entry point: [`Orchestrator::run_turn`].

pub mod attachments;
pub mod cancel;
pub mod engine;
pub mod session;
pub mod session_lock;
pub mod turn;

pub use attachments::{AttachmentMediator, FileKind};
pub use cancel::{CancelMap, CancelToken};
pub use engine::{Engine, ToolCallRecord, TurnOutcome, TurnSummary};
pub use session::{Session, SessionState, SessionStore};
pub use session_lock::{SessionBusy, SessionLockMap};
pub use turn::{Orchestrator, TurnError, TurnInput};
