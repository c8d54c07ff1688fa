//! Per-session capture statistics.
//!
//! Counts what the capture engine recorded so that a session can be audited
//! without opening the journal. Counters are lock-free so listeners on the
//! host's event thread can bump them cheaply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::capture::EventCategory;

/// File name of the statistics written next to the journal.
pub const STATS_FILE_NAME: &str = "transparency.json";

/// Capture statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    actions: AtomicU64,
    typings: AtomicU64,
    mouse_events: AtomicU64,
    caret_events: AtomicU64,
    selection_events: AtomicU64,
    visible_area_events: AtomicU64,
    file_events: AtomicU64,
    content_changes: AtomicU64,
    snapshots_written: AtomicU64,
    snapshots_failed: AtomicU64,
    dropped_while_paused: AtomicU64,
    session_start: DateTime<Utc>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            actions: AtomicU64::new(0),
            typings: AtomicU64::new(0),
            mouse_events: AtomicU64::new(0),
            caret_events: AtomicU64::new(0),
            selection_events: AtomicU64::new(0),
            visible_area_events: AtomicU64::new(0),
            file_events: AtomicU64::new(0),
            content_changes: AtomicU64::new(0),
            snapshots_written: AtomicU64::new(0),
            snapshots_failed: AtomicU64::new(0),
            dropped_while_paused: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record a captured event of the given category.
    pub fn record_event(&self, category: EventCategory) {
        let counter = match category {
            EventCategory::Action => &self.actions,
            EventCategory::Typing => &self.typings,
            EventCategory::Mouse => &self.mouse_events,
            EventCategory::Caret => &self.caret_events,
            EventCategory::Selection => &self.selection_events,
            EventCategory::VisibleArea => &self.visible_area_events,
            EventCategory::File => &self.file_events,
            EventCategory::Document => &self.content_changes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of one content snapshot.
    pub fn record_snapshot(&self, written: bool) {
        if written {
            self.snapshots_written.fetch_add(1, Ordering::Relaxed);
        } else {
            self.snapshots_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an event that arrived while capture was paused.
    pub fn record_dropped(&self) {
        self.dropped_while_paused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            actions: self.actions.load(Ordering::Relaxed),
            typings: self.typings.load(Ordering::Relaxed),
            mouse_events: self.mouse_events.load(Ordering::Relaxed),
            caret_events: self.caret_events.load(Ordering::Relaxed),
            selection_events: self.selection_events.load(Ordering::Relaxed),
            visible_area_events: self.visible_area_events.load(Ordering::Relaxed),
            file_events: self.file_events.load(Ordering::Relaxed),
            content_changes: self.content_changes.load(Ordering::Relaxed),
            snapshots_written: self.snapshots_written.load(Ordering::Relaxed),
            snapshots_failed: self.snapshots_failed.load(Ordering::Relaxed),
            dropped_while_paused: self.dropped_while_paused.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Actions: {}\n\
             - Keystrokes: {}\n\
             - Pointer events: {}\n\
             - Caret events: {}\n\
             - Selection events: {}\n\
             - Viewport events: {}\n\
             - File events: {}\n\
             - Content changes: {}\n\
             - Snapshots written: {} (failed: {})\n\
             - Events ignored while paused: {}\n\
             - Session duration: {} seconds",
            stats.actions,
            stats.typings,
            stats.mouse_events,
            stats.caret_events,
            stats.selection_events,
            stats.visible_area_events,
            stats.file_events,
            stats.content_changes,
            stats.snapshots_written,
            stats.snapshots_failed,
            stats.dropped_while_paused,
            stats.session_duration_secs
        )
    }

    /// Write the statistics into `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATS_FILE_NAME);
        let json = serde_json::to_string_pretty(&self.stats()).map_err(std::io::Error::other)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the capture statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub actions: u64,
    pub typings: u64,
    pub mouse_events: u64,
    pub caret_events: u64,
    pub selection_events: u64,
    pub visible_area_events: u64,
    pub file_events: u64,
    pub content_changes: u64,
    pub snapshots_written: u64,
    pub snapshots_failed: u64,
    pub dropped_while_paused: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}
