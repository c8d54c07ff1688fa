//! The session coordinator.
//!
//! Owns the state machine `Idle → Tracking ⇄ Paused → Idle` and every tracker
//! of the active session. Transitions take `&mut self`: callers that share a
//! coordinator across threads must serialize access themselves.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::state::SessionState;
use crate::capture::{CaptureEngine, CaptureError, CaptureSettings, EventSurface};
use crate::config::{Config, ConfigError, ConfigSource};
use crate::probe::{AvailabilityProbe, ProbeError};
use crate::trackers::{
    CaptureTracker, NoopRecorder, RecorderFactory, ScreenRecorder, SensorSettings, SensorTracker,
    Tracker, TrackerError,
};
use crate::transparency::TransparencyStats;

/// Errors from session transitions.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no configuration at {0}; configure the tracker first")]
    ConfigMissing(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },

    #[error("project root must not be empty")]
    EmptyProjectRoot,

    #[error("interpreter {0} is not usable for gaze tracking; configure it first")]
    EnvironmentUnavailable(String),

    #[error("eye tracker not found; select mouse simulation or connect a device")]
    DeviceUnavailable,

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error("failed to create session directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub output_dir: PathBuf,
    pub journal_path: PathBuf,
    pub event_count: usize,
    pub stats: TransparencyStats,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

struct ActiveSession {
    id: String,
    output_dir: PathBuf,
    started_at: DateTime<Utc>,
    engine: CaptureEngine,
    /// In start order.
    trackers: Vec<Box<dyn Tracker>>,
}

/// Coordinates the capture engine and the optional trackers of one session
/// at a time.
pub struct SessionCoordinator {
    config_source: Arc<dyn ConfigSource>,
    surface: Arc<dyn EventSurface>,
    recorder_factory: RecorderFactory,
    state: SessionState,
    session: Option<ActiveSession>,
}

impl SessionCoordinator {
    pub fn new(config_source: Arc<dyn ConfigSource>, surface: Arc<dyn EventSurface>) -> Self {
        Self {
            config_source,
            surface,
            recorder_factory: Arc::new(|| Box::new(NoopRecorder) as Box<dyn ScreenRecorder>),
            state: SessionState::Idle,
            session: None,
        }
    }

    /// Use `factory` to create the screen recorder of each session.
    pub fn with_recorder<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ScreenRecorder> + Send + Sync + 'static,
    {
        self.recorder_factory = Arc::new(factory);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    /// Output directory of the active session.
    pub fn output_dir(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.output_dir.as_path())
    }

    /// Capture statistics of the active session.
    pub fn stats(&self) -> Option<TransparencyStats> {
        self.session.as_ref().map(|s| s.engine.stats())
    }

    /// Start a session for `project_root`.
    ///
    /// The configuration is re-read on every call. When gaze tracking is
    /// enabled the interpreter (and, for a physical device, the device) is
    /// probed first. Any failure leaves the coordinator idle.
    pub fn start(&mut self, project_root: &Path) -> Result<&Path, SessionError> {
        if self.state != SessionState::Idle {
            return Err(SessionError::InvalidState {
                action: "start",
                state: self.state,
            });
        }
        if project_root.as_os_str().is_empty() {
            return Err(SessionError::EmptyProjectRoot);
        }
        if !self.config_source.exists() {
            return Err(SessionError::ConfigMissing(self.config_source.location()));
        }
        let config = self.config_source.load()?;

        if config.sensor_enabled() {
            preflight(&config)?;
        }

        let started_at = Utc::now();
        let output_dir = config
            .output_base(project_root)
            .join(started_at.timestamp_millis().to_string());
        std::fs::create_dir_all(&output_dir).map_err(|source| SessionError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let session = self.launch(&config, project_root, output_dir, started_at)?;
        info!(
            session = %session.id,
            output = %session.output_dir.display(),
            trackers = session.trackers.len(),
            "session started"
        );

        self.state = SessionState::Tracking;
        let session = self.session.insert(session);
        Ok(session.output_dir.as_path())
    }

    /// Start screen capture, then the capture engine, then the gaze sensor.
    /// Whatever already started is stopped again if a later step fails.
    fn launch(
        &self,
        config: &Config,
        project_root: &Path,
        output_dir: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Result<ActiveSession, SessionError> {
        let id = Uuid::new_v4().to_string();
        let mut trackers: Vec<Box<dyn Tracker>> = Vec::new();

        if config.screen_capture_enabled() {
            let mut capture = CaptureTracker::new((self.recorder_factory)(), &output_dir);
            capture.start()?;
            trackers.push(Box::new(capture));
        }

        let settings = CaptureSettings {
            session_id: id.clone(),
            project_root: project_root.to_path_buf(),
            output_dir: output_dir.clone(),
            debounce_interval: config.debounce_interval,
            code_extensions: config.code_extensions.clone(),
        };
        let engine = match CaptureEngine::start(Arc::clone(&self.surface), settings) {
            Ok(engine) => engine,
            Err(e) => {
                roll_back(&mut trackers);
                return Err(e.into());
            }
        };

        if config.sensor_enabled() {
            let mut sensor = SensorTracker::new(SensorSettings {
                interpreter: config.python_interpreter.clone(),
                output_dir: output_dir.clone(),
                project_root: project_root.to_path_buf(),
                sample_frequency: config.sample_frequency,
                device_index: config.eye_tracker_device,
            });
            if let Err(e) = sensor.start() {
                drop(engine);
                roll_back(&mut trackers);
                return Err(e.into());
            }
            trackers.push(Box::new(sensor));
        }

        Ok(ActiveSession {
            id,
            output_dir,
            started_at,
            engine,
            trackers,
        })
    }

    /// Suspend event capture and every tracker.
    pub fn pause(&mut self) -> Result<(), SessionError> {
        let session = match (&self.state, self.session.as_mut()) {
            (SessionState::Tracking, Some(session)) => session,
            _ => {
                return Err(SessionError::InvalidState {
                    action: "pause",
                    state: self.state,
                })
            }
        };

        session.engine.pause();
        let result = for_each_tracker(&mut session.trackers, |t| t.pause());
        self.state = SessionState::Paused;
        info!("session paused");
        result
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        let session = match (&self.state, self.session.as_mut()) {
            (SessionState::Paused, Some(session)) => session,
            _ => {
                return Err(SessionError::InvalidState {
                    action: "resume",
                    state: self.state,
                })
            }
        };

        session.engine.resume();
        let result = for_each_tracker(&mut session.trackers, |t| t.resume());
        self.state = SessionState::Tracking;
        info!("session resumed");
        result
    }

    /// Record a user label in the journal.
    pub fn add_label(&mut self, label: &str) -> Result<(), SessionError> {
        match (&self.state, self.session.as_ref()) {
            (SessionState::Tracking, Some(session)) => {
                session.engine.record_label(label);
                Ok(())
            }
            _ => Err(SessionError::InvalidState {
                action: "add a label",
                state: self.state,
            }),
        }
    }

    /// Stop the session and write its artifacts.
    ///
    /// The coordinator is idle afterwards even on error. Every tracker is
    /// stopped; the first failure is reported.
    pub fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        let Some(session) = self.session.take() else {
            return Err(SessionError::InvalidState {
                action: "stop",
                state: self.state,
            });
        };
        self.state = SessionState::Idle;

        let ActiveSession {
            id,
            output_dir,
            started_at,
            engine,
            mut trackers,
        } = session;

        let outcome = engine.stop();
        trackers.reverse();
        let trackers_result = for_each_tracker(&mut trackers, |t| t.stop());

        let outcome = outcome?;
        trackers_result?;

        let summary = SessionSummary {
            session_id: id,
            output_dir,
            journal_path: outcome.journal_path,
            event_count: outcome.event_count,
            stats: outcome.stats,
            started_at,
            stopped_at: Utc::now(),
        };
        info!(
            session = %summary.session_id,
            events = summary.event_count,
            "session stopped"
        );
        Ok(summary)
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if self.session.is_some() {
            if let Err(e) = self.stop() {
                warn!("Failed to stop session on drop: {e}");
            }
        }
    }
}

/// Check that the interpreter, and a selected device, are usable.
fn preflight(config: &Config) -> Result<(), SessionError> {
    let probe = AvailabilityProbe::new(&config.python_interpreter, config.probe_timeout)?;

    match probe.check_environment() {
        Ok(true) => {}
        Ok(false) => {
            return Err(SessionError::EnvironmentUnavailable(
                config.python_interpreter.clone(),
            ))
        }
        Err(e) if e.is_missing_interpreter() => {
            return Err(SessionError::EnvironmentUnavailable(
                config.python_interpreter.clone(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    if config.eye_tracker_device != 0 && !probe.check_device()? {
        return Err(SessionError::DeviceUnavailable);
    }
    Ok(())
}

/// Apply `op` to every tracker, returning the first error.
fn for_each_tracker<F>(trackers: &mut [Box<dyn Tracker>], mut op: F) -> Result<(), SessionError>
where
    F: FnMut(&mut dyn Tracker) -> Result<(), TrackerError>,
{
    let mut first_error = None;
    for tracker in trackers.iter_mut() {
        if let Err(e) = op(tracker.as_mut()) {
            warn!("{} tracker failed: {e}", tracker.name());
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn roll_back(trackers: &mut Vec<Box<dyn Tracker>>) {
    for mut tracker in trackers.drain(..).rev() {
        if let Err(e) = tracker.stop() {
            warn!("Failed to roll back {} tracker: {e}", tracker.name());
        }
    }
}
