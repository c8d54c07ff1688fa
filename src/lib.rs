//! IDE Tracker - session journal of developer interaction events.
//!
//! This library records what a developer does in an IDE during a tracking
//! session (commands, keystrokes, pointer, caret, selection, viewport and file
//! events, plus snapshots of changed source files) into a per-session output
//! directory, alongside optional gaze-sensor and screen-capture data.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      SessionCoordinator                       │
//! │            Idle ──start──▶ Tracking ⇄ Paused ──stop──▶ Idle   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌───────────────┐   ┌─────────────────┐   │
//! │  │ Availability│   │ CaptureEngine │   │  SensorTracker  │   │
//! │  │    Probe    │   │  (listeners)  │   │ (gaze process)  │   │
//! │  └─────────────┘   └───────┬───────┘   └─────────────────┘   │
//! │                            │           ┌─────────────────┐   │
//! │                            ▼           │ CaptureTracker  │   │
//! │                 ┌─────────────────────┐│ (screen video)  │   │
//! │                 │ Journal + Snapshots ││                 │   │
//! │                 └─────────────────────┘└─────────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use ide_tracker::capture::{HostEvent, LocalSurface, Position};
//! use ide_tracker::config::FileConfigSource;
//! use ide_tracker::session::SessionCoordinator;
//!
//! let surface = Arc::new(LocalSurface::default());
//! let mut coordinator =
//!     SessionCoordinator::new(Arc::new(FileConfigSource::default()), surface.clone());
//!
//! coordinator.start(Path::new("/path/to/project")).expect("failed to start");
//! surface.dispatch(&HostEvent::CaretMoved {
//!     path: None,
//!     position: Position::new(1, 0),
//! });
//! let summary = coordinator.stop().expect("failed to stop");
//! println!("journal written to {}", summary.journal_path.display());
//! ```

pub mod capture;
pub mod config;
pub mod journal;
pub mod path;
pub mod probe;
pub mod session;
pub mod trackers;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use capture::{CaptureEngine, EventSurface, HostEvent, LocalSurface};
pub use config::{Config, ConfigSource, FileConfigSource};
pub use journal::Journal;
pub use probe::AvailabilityProbe;
pub use session::{SessionCoordinator, SessionError, SessionState, SessionSummary};
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Declaration of what a tracking session records, shown to participants.
pub const CAPTURE_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║               IDE TRACKER - CAPTURE DECLARATION                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  While a session is tracking, this tool records:                 ║
║                                                                  ║
║  ✓ IDE EVENTS:                                                   ║
║    • Commands you invoke and the characters you type             ║
║    • Caret, selection and scroll positions in the editor         ║
║    • Mouse presses, clicks and movement inside the IDE           ║
║    • Files you open, close and switch between                    ║
║    • Copies of changed source files and console output           ║
║                                                                  ║
║  ✓ OPTIONAL (when enabled in the configuration):                 ║
║    • Gaze samples from an eye tracker or mouse simulation        ║
║    • Screen recording                                            ║
║                                                                  ║
║  ✗ NOTHING IS RECORDED while the session is paused or stopped.   ║
║                                                                  ║
║  All data stays in the session output folder on this machine.    ║
║  Counts of everything recorded are written to transparency.json. ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_declaration_contents() {
        assert!(CAPTURE_DECLARATION.contains("CAPTURE DECLARATION"));
        assert!(CAPTURE_DECLARATION.contains("paused or stopped"));
        assert!(CAPTURE_DECLARATION.contains("transparency.json"));
    }
}
