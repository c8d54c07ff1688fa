//! External data sources with their own start/pause/resume/stop lifecycle.
//!
//! The session coordinator owns one handle per enabled source and drives
//! every handle through the same [`Tracker`] contract.

pub mod screen;
pub mod sensor;

pub use screen::{CaptureTracker, NoopRecorder, RecorderFactory, ScreenRecorder};
pub use sensor::{GazeLog, GazeSample, SensorSettings, SensorTracker, GAZE_FILE_NAME};

use std::path::PathBuf;
use thiserror::Error;

/// Lifecycle state of one tracker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// A lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl std::fmt::Display for TrackerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TrackerAction::Start => "start",
            TrackerAction::Pause => "pause",
            TrackerAction::Resume => "resume",
            TrackerAction::Stop => "stop",
        };
        f.write_str(name)
    }
}

impl TrackerStatus {
    /// The status after applying `action`, or `None` if the transition is not
    /// allowed from this status.
    pub fn apply(self, action: TrackerAction) -> Option<TrackerStatus> {
        match (self, action) {
            (TrackerStatus::Stopped, TrackerAction::Start) => Some(TrackerStatus::Running),
            (TrackerStatus::Running, TrackerAction::Pause) => Some(TrackerStatus::Paused),
            (TrackerStatus::Paused, TrackerAction::Resume) => Some(TrackerStatus::Running),
            (TrackerStatus::Running | TrackerStatus::Paused, TrackerAction::Stop) => {
                Some(TrackerStatus::Stopped)
            }
            _ => None,
        }
    }

    /// Like [`apply`](Self::apply), reporting a refused transition as an error.
    pub fn transition(
        self,
        tracker: &'static str,
        action: TrackerAction,
    ) -> Result<TrackerStatus, TrackerError> {
        self.apply(action).ok_or(TrackerError::InvalidTransition {
            tracker,
            from: self,
            action,
        })
    }
}

/// Errors from tracker lifecycle operations.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("{tracker} tracker cannot {action} while {from:?}")]
    InvalidTransition {
        tracker: &'static str,
        from: TrackerStatus,
        action: TrackerAction,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tracker output error at {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tracker serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("screen recorder error: {0}")]
    Recorder(String),
}

/// A data source the session coordinator starts, pauses, resumes and stops.
pub trait Tracker: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn status(&self) -> TrackerStatus;

    fn start(&mut self) -> Result<(), TrackerError>;

    fn pause(&mut self) -> Result<(), TrackerError>;

    fn resume(&mut self) -> Result<(), TrackerError>;

    /// Stop the source and finalize its output.
    fn stop(&mut self) -> Result<(), TrackerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let status = TrackerStatus::Stopped;
        let status = status.transition("test", TrackerAction::Start).unwrap();
        assert_eq!(status, TrackerStatus::Running);
        let status = status.transition("test", TrackerAction::Pause).unwrap();
        assert_eq!(status, TrackerStatus::Paused);
        let status = status.transition("test", TrackerAction::Resume).unwrap();
        assert_eq!(status, TrackerStatus::Running);
        assert_eq!(
            TrackerStatus::Paused.apply(TrackerAction::Stop),
            Some(TrackerStatus::Stopped)
        );
    }

    #[test]
    fn test_refused_transitions() {
        assert_eq!(TrackerStatus::Stopped.apply(TrackerAction::Pause), None);
        assert_eq!(TrackerStatus::Stopped.apply(TrackerAction::Stop), None);
        assert_eq!(TrackerStatus::Running.apply(TrackerAction::Start), None);
        assert_eq!(TrackerStatus::Running.apply(TrackerAction::Resume), None);
        assert_eq!(TrackerStatus::Paused.apply(TrackerAction::Pause), None);

        let err = TrackerStatus::Running
            .transition("sensor", TrackerAction::Start)
            .unwrap_err();
        assert_eq!(err.to_string(), "sensor tracker cannot start while Running");
    }
}
