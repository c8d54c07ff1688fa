//! Session lifecycle: one coordinator, one active session at a time.

pub mod coordinator;
pub mod state;

pub use coordinator::{SessionCoordinator, SessionError, SessionSummary};
pub use state::SessionState;
