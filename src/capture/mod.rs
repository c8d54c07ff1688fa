//! Event capture for the IDE tracker.
//!
//! This module turns IDE host events into journal records and content
//! snapshots while a session is tracking.

pub mod engine;
pub mod snapshot;
pub mod surface;
pub mod types;

pub use engine::{
    CaptureEngine, CaptureError, CaptureOutcome, CaptureSettings, DEFAULT_DEBOUNCE_INTERVAL,
    MIN_DEBOUNCE_INTERVAL,
};
pub use snapshot::{SnapshotLogger, SnapshotRequest, SnapshotSource, DEFAULT_CODE_EXTENSIONS};
pub use surface::{EventSurface, Listener, ListenerId, LocalSurface};
pub use types::{EditorKind, EventCategory, HostEvent, HostInfo, Position};
