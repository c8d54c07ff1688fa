//! Gaze sensor tracker backed by an external interpreter process.
//!
//! The process prints one JSON gaze sample per line on stdout. A reader
//! thread collects samples while the tracker is running; pause and resume
//! are forwarded to the process as `pause` / `resume` lines on its stdin.
//! Stopping kills the process and writes the collected samples to
//! `<output>/eye_tracking.json`.

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Tracker, TrackerAction, TrackerError, TrackerStatus};

/// File name of the gaze log inside the session output directory.
pub const GAZE_FILE_NAME: &str = "eye_tracking.json";

/// How long stop waits for the sensor output to close after the kill.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

const MOUSE_SIMULATION_SCRIPT: &str = "\
import json, sys, threading, time
import pyautogui
from screeninfo import get_monitors

frequency = float(sys.argv[1])
monitor = get_monitors()[0]
paused = threading.Event()

def control():
    for line in sys.stdin:
        command = line.strip()
        if command == 'pause':
            paused.set()
        elif command == 'resume':
            paused.clear()

threading.Thread(target=control, daemon=True).start()

while True:
    if not paused.is_set():
        x, y = pyautogui.position()
        print(json.dumps({
            'timestamp': int(time.time() * 1000),
            'x': x / monitor.width,
            'y': y / monitor.height,
        }), flush=True)
    time.sleep(1.0 / frequency)
";

const TOBII_SCRIPT: &str = "\
import json, sys, threading, time
import tobii_research as tr

frequency = float(sys.argv[1])
device = int(sys.argv[2]) - 1
tracker = tr.find_all_eyetrackers()[device]
tracker.set_gaze_output_frequency(frequency)
paused = threading.Event()

def on_gaze(data):
    if paused.is_set():
        return
    print(json.dumps({
        'timestamp': int(time.time() * 1000),
        'device_timestamp': data['device_time_stamp'],
        'left': data['left_gaze_point_on_display_area'],
        'right': data['right_gaze_point_on_display_area'],
        'left_pupil': data['left_pupil_diameter'],
        'right_pupil': data['right_pupil_diameter'],
    }), flush=True)

tracker.subscribe_to(tr.EYETRACKER_GAZE_DATA, on_gaze, as_dictionary=True)
for line in sys.stdin:
    command = line.strip()
    if command == 'pause':
        paused.set()
    elif command == 'resume':
        paused.clear()
tracker.unsubscribe_from(tr.EYETRACKER_GAZE_DATA, on_gaze)
";

/// Parameters of the gaze sensor process.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    pub interpreter: String,
    pub output_dir: PathBuf,
    pub project_root: PathBuf,
    pub sample_frequency: f64,
    /// 0 selects pointer-based simulation instead of a physical device.
    pub device_index: u32,
}

impl SensorSettings {
    pub fn is_simulated(&self) -> bool {
        self.device_index == 0
    }
}

/// One line received from the sensor process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    /// Receive time, in milliseconds since the epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// The line as printed, when it was not valid JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl GazeSample {
    fn from_line(line: &str) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        match serde_json::from_str(line) {
            Ok(data) => Self {
                timestamp,
                data: Some(data),
                raw: None,
            },
            Err(_) => Self {
                timestamp,
                data: None,
                raw: Some(line.to_string()),
            },
        }
    }
}

/// Contents of the gaze log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazeLog {
    pub project_path: String,
    pub device_index: u32,
    pub sample_frequency: f64,
    pub simulated: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub samples: Vec<GazeSample>,
}

impl GazeLog {
    pub fn read_from(path: &Path) -> Result<Self, TrackerError> {
        let content = std::fs::read_to_string(path).map_err(|source| TrackerError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Default)]
struct SampleBuffer {
    accepting: AtomicBool,
    samples: Mutex<Vec<GazeSample>>,
}

impl SampleBuffer {
    fn samples(&self) -> MutexGuard<'_, Vec<GazeSample>> {
        self.samples
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct OutputReader {
    handle: JoinHandle<()>,
    /// Disconnects when the reader thread exits.
    done: Receiver<()>,
}

/// Lifecycle handle for the gaze sensor process.
pub struct SensorTracker {
    settings: SensorSettings,
    script: Option<String>,
    status: TrackerStatus,
    buffer: Arc<SampleBuffer>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<OutputReader>,
    started_at: Option<DateTime<Utc>>,
}

impl SensorTracker {
    pub fn new(settings: SensorSettings) -> Self {
        Self {
            settings,
            script: None,
            status: TrackerStatus::Stopped,
            buffer: Arc::new(SampleBuffer::default()),
            child: None,
            stdin: None,
            reader: None,
            started_at: None,
        }
    }

    /// Run `script` instead of the built-in sensor script.
    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn settings(&self) -> &SensorSettings {
        &self.settings
    }

    /// Number of samples collected so far.
    pub fn sample_count(&self) -> usize {
        self.buffer.samples().len()
    }

    pub fn output_path(&self) -> PathBuf {
        self.settings.output_dir.join(GAZE_FILE_NAME)
    }

    fn script(&self) -> &str {
        match &self.script {
            Some(script) => script,
            None if self.settings.is_simulated() => MOUSE_SIMULATION_SCRIPT,
            None => TOBII_SCRIPT,
        }
    }

    fn send_control(&mut self, command: &str) {
        if let Some(stdin) = self.stdin.as_mut() {
            let result = writeln!(stdin, "{command}").and_then(|_| stdin.flush());
            if let Err(e) = result {
                warn!("Failed to send {command} to sensor process: {e}");
            }
        }
    }

    fn write_log(&self) -> Result<PathBuf, TrackerError> {
        let log = GazeLog {
            project_path: self.settings.project_root.to_string_lossy().into_owned(),
            device_index: self.settings.device_index,
            sample_frequency: self.settings.sample_frequency,
            simulated: self.settings.is_simulated(),
            started_at: self.started_at,
            samples: std::mem::take(&mut *self.buffer.samples()),
        };
        let path = self.output_path();
        let output_error = |source| TrackerError::Output {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(&self.settings.output_dir).map_err(output_error)?;
        let content = serde_json::to_string_pretty(&log)?;
        std::fs::write(&path, content).map_err(output_error)?;
        Ok(path)
    }

    fn terminate(&mut self) {
        self.buffer.accepting.store(false, Ordering::SeqCst);
        // Closing stdin ends the control loop of well-behaved scripts.
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                warn!("Failed to kill sensor process: {e}");
            }
            if let Err(e) = child.wait() {
                warn!("Failed to reap sensor process: {e}");
            }
        }
        if let Some(reader) = self.reader.take() {
            match reader.done.recv_timeout(READER_JOIN_TIMEOUT) {
                Err(RecvTimeoutError::Timeout) => {
                    // A descendant of the script still holds stdout open.
                    warn!("Sensor output still open after kill; detaching reader");
                }
                _ => {
                    if reader.handle.join().is_err() {
                        warn!("Sensor reader thread panicked");
                    }
                }
            }
        }
    }
}

impl Tracker for SensorTracker {
    fn name(&self) -> &'static str {
        "sensor"
    }

    fn status(&self) -> TrackerStatus {
        self.status
    }

    fn start(&mut self) -> Result<(), TrackerError> {
        let next = self.status.transition(self.name(), TrackerAction::Start)?;

        let mut child = Command::new(&self.settings.interpreter)
            .arg("-c")
            .arg(self.script())
            .arg(self.settings.sample_frequency.to_string())
            .arg(self.settings.device_index.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| TrackerError::Spawn {
                program: self.settings.interpreter.clone(),
                source,
            })?;

        self.buffer.samples().clear();
        self.buffer.accepting.store(true, Ordering::SeqCst);

        if let Some(stdout) = child.stdout.take() {
            let buffer = Arc::clone(&self.buffer);
            let (done_tx, done) = bounded::<()>(0);
            let handle = thread::spawn(move || {
                let _done = done_tx;
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    let line = line.trim();
                    if line.is_empty() || !buffer.accepting.load(Ordering::SeqCst) {
                        continue;
                    }
                    buffer.samples().push(GazeSample::from_line(line));
                }
                debug!("sensor output closed");
            });
            self.reader = Some(OutputReader { handle, done });
        }
        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.started_at = Some(Utc::now());
        self.status = next;

        info!(
            device = self.settings.device_index,
            frequency = self.settings.sample_frequency,
            "sensor tracker started"
        );
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TrackerError> {
        self.status = self.status.transition(self.name(), TrackerAction::Pause)?;
        self.buffer.accepting.store(false, Ordering::SeqCst);
        self.send_control("pause");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TrackerError> {
        self.status = self.status.transition(self.name(), TrackerAction::Resume)?;
        self.buffer.accepting.store(true, Ordering::SeqCst);
        self.send_control("resume");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TrackerError> {
        self.status = self.status.transition(self.name(), TrackerAction::Stop)?;
        self.terminate();
        let path = self.write_log()?;
        info!(path = %path.display(), "sensor tracker stopped");
        Ok(())
    }
}

impl Drop for SensorTracker {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(output: &Path, device_index: u32) -> SensorSettings {
        SensorSettings {
            interpreter: "sh".to_string(),
            output_dir: output.to_path_buf(),
            project_root: PathBuf::from("/proj"),
            sample_frequency: 60.0,
            device_index,
        }
    }

    #[test]
    fn test_script_selection() {
        let output = tempfile::tempdir().unwrap();
        let simulated = SensorTracker::new(settings(output.path(), 0));
        assert!(simulated.script().contains("pyautogui"));
        let device = SensorTracker::new(settings(output.path(), 1));
        assert!(device.script().contains("tobii_research"));
    }

    #[test]
    fn test_gaze_sample_keeps_unparseable_lines() {
        let sample = GazeSample::from_line("not json");
        assert_eq!(sample.raw.as_deref(), Some("not json"));
        assert!(sample.data.is_none());

        let sample = GazeSample::from_line(r#"{"x":0.5}"#);
        assert_eq!(sample.data.unwrap()["x"], 0.5);
    }

    #[test]
    fn test_pause_requires_running() {
        let output = tempfile::tempdir().unwrap();
        let mut tracker = SensorTracker::new(settings(output.path(), 0));
        assert!(matches!(
            tracker.pause(),
            Err(TrackerError::InvalidTransition { .. })
        ));
        assert_eq!(tracker.status(), TrackerStatus::Stopped);
    }

    #[test]
    fn test_missing_interpreter_fails_to_start() {
        let output = tempfile::tempdir().unwrap();
        let mut tracker = SensorTracker::new(SensorSettings {
            interpreter: "/definitely/not/an/interpreter".to_string(),
            ..settings(output.path(), 0)
        });
        assert!(matches!(tracker.start(), Err(TrackerError::Spawn { .. })));
        assert_eq!(tracker.status(), TrackerStatus::Stopped);
    }

    #[cfg(unix)]
    #[test]
    fn test_samples_are_written_on_stop() {
        let output = tempfile::tempdir().unwrap();
        let mut tracker = SensorTracker::new(settings(output.path(), 2))
            .with_script(r#"echo '{"x":0.25,"y":0.75}'; echo "freq=$0 device=$1"; sleep 30"#);

        tracker.start().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while tracker.sample_count() < 2 && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(10));
        }
        tracker.stop().unwrap();
        assert_eq!(tracker.status(), TrackerStatus::Stopped);

        let log = GazeLog::read_from(&output.path().join(GAZE_FILE_NAME)).unwrap();
        assert_eq!(log.device_index, 2);
        assert!(!log.simulated);
        assert_eq!(log.samples.len(), 2);
        assert_eq!(log.samples[0].data.as_ref().unwrap()["y"], 0.75);
        assert_eq!(log.samples[1].raw.as_deref(), Some("freq=60 device=2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_does_not_wait_for_orphaned_output() {
        let output = tempfile::tempdir().unwrap();
        let mut tracker = SensorTracker::new(settings(output.path(), 0))
            .with_script(r#"sleep 30 & echo '{"x":1}'; wait"#);

        tracker.start().unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while tracker.sample_count() < 1 && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(10));
        }

        let stopping = std::time::Instant::now();
        tracker.stop().unwrap();
        assert!(stopping.elapsed() < std::time::Duration::from_secs(10));

        let log = GazeLog::read_from(&output.path().join(GAZE_FILE_NAME)).unwrap();
        assert_eq!(log.samples.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_paused_tracker_discards_samples() {
        let output = tempfile::tempdir().unwrap();
        let mut tracker = SensorTracker::new(settings(output.path(), 0))
            .with_script(r#"while true; do echo '{"x":1}'; sleep 0.02; done"#);

        tracker.start().unwrap();
        thread::sleep(std::time::Duration::from_millis(150));
        tracker.pause().unwrap();
        thread::sleep(std::time::Duration::from_millis(50));
        let paused_count = tracker.sample_count();
        thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(tracker.sample_count(), paused_count);

        tracker.resume().unwrap();
        tracker.stop().unwrap();
    }
}
