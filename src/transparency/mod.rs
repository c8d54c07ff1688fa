//! Transparency module for the IDE tracker.
//!
//! Tracks how much the capture engine recorded during a session so the
//! participant and the researcher can audit it.

pub mod log;

pub use log::{
    create_shared_log, SharedTransparencyLog, TransparencyLog, TransparencyStats, STATS_FILE_NAME,
};
