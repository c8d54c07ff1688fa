//! Screen-capture tracker.
//!
//! Video capture itself lives behind [`ScreenRecorder`]; the tracker only
//! enforces the lifecycle and binds the recorder to the session output
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::{Tracker, TrackerAction, TrackerError, TrackerStatus};

/// A screen-video recording backend.
pub trait ScreenRecorder: Send {
    /// Begin recording into `output_dir`.
    fn start(&mut self, output_dir: &Path) -> Result<(), TrackerError>;

    fn pause(&mut self) -> Result<(), TrackerError>;

    fn resume(&mut self) -> Result<(), TrackerError>;

    /// Stop and finalize the recording.
    fn stop(&mut self) -> Result<(), TrackerError>;
}

/// Creates a fresh recorder for each session.
pub type RecorderFactory = Arc<dyn Fn() -> Box<dyn ScreenRecorder> + Send + Sync>;

/// Recorder that captures nothing.
#[derive(Debug, Default)]
pub struct NoopRecorder;

impl ScreenRecorder for NoopRecorder {
    fn start(&mut self, output_dir: &Path) -> Result<(), TrackerError> {
        debug!(output = %output_dir.display(), "noop screen recorder started");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TrackerError> {
        Ok(())
    }
}

/// Lifecycle handle for a screen recorder.
pub struct CaptureTracker {
    recorder: Box<dyn ScreenRecorder>,
    output_dir: PathBuf,
    status: TrackerStatus,
}

impl CaptureTracker {
    pub fn new(recorder: Box<dyn ScreenRecorder>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            recorder,
            output_dir: output_dir.into(),
            status: TrackerStatus::Stopped,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Tracker for CaptureTracker {
    fn name(&self) -> &'static str {
        "capture"
    }

    fn status(&self) -> TrackerStatus {
        self.status
    }

    fn start(&mut self) -> Result<(), TrackerError> {
        let next = self.status.transition(self.name(), TrackerAction::Start)?;
        self.recorder.start(&self.output_dir)?;
        self.status = next;
        info!(output = %self.output_dir.display(), "screen capture started");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TrackerError> {
        let next = self.status.transition(self.name(), TrackerAction::Pause)?;
        self.recorder.pause()?;
        self.status = next;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TrackerError> {
        let next = self.status.transition(self.name(), TrackerAction::Resume)?;
        self.recorder.resume()?;
        self.status = next;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TrackerError> {
        self.status = self.status.transition(self.name(), TrackerAction::Stop)?;
        self.recorder.stop()?;
        info!("screen capture stopped");
        Ok(())
    }
}
