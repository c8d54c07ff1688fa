//! Availability probes for sensor-backed tracking.
//!
//! A probe runs `<interpreter> -c <inline script>`, reads the first line the
//! process prints (stdout and stderr share one pipe) and waits for it to exit.
//! A non-zero exit status is an error: it means the environment is broken,
//! not that the answer is "no".

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Sentinel printed by the environment check.
pub const OK: &str = "OK";
/// Sentinel printed when a device is present.
pub const FOUND: &str = "Found";
/// Sentinel printed when no device is present.
pub const NOT_FOUND: &str = "Not Found";

/// Default upper bound for a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const ENVIRONMENT_SCRIPT: &str = "\
from screeninfo import get_monitors
import pyautogui
import time
import sys
import math

print('OK')
";

const DEVICE_PRESENCE_SCRIPT: &str = "\
import tobii_research as tr

trackers = tr.find_all_eyetrackers()
print('Found' if trackers else 'Not Found')
";

const DEVICE_NAME_SCRIPT: &str = "\
import tobii_research as tr

trackers = tr.find_all_eyetrackers()
print(trackers[0].device_name if trackers else 'Not Found')
";

const FREQUENCIES_SCRIPT: &str = "\
import tobii_research as tr

trackers = tr.find_all_eyetrackers()
print(trackers[0].get_all_gaze_output_frequencies() if trackers else 'Not Found')
";

/// The fixed set of inline probe scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeScript {
    /// Interpreter has the packages the sensor scripts import.
    Environment,
    /// An eye tracker is connected.
    DevicePresence,
    /// Name of the first connected eye tracker.
    DeviceName,
    /// Gaze output frequencies supported by the first eye tracker.
    Frequencies,
}

impl ProbeScript {
    pub fn source(self) -> &'static str {
        match self {
            ProbeScript::Environment => ENVIRONMENT_SCRIPT,
            ProbeScript::DevicePresence => DEVICE_PRESENCE_SCRIPT,
            ProbeScript::DeviceName => DEVICE_NAME_SCRIPT,
            ProbeScript::Frequencies => FREQUENCIES_SCRIPT,
        }
    }
}

/// Errors from running a probe.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The interpreter path was blank; nothing was spawned.
    #[error("interpreter path must not be blank")]
    BlankInterpreter,

    /// The interpreter could not be started.
    #[error("failed to start interpreter {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    /// The probe process exited unsuccessfully.
    #[error("probe exited with {status} (first line: {first_line:?})")]
    Failed {
        status: ExitStatus,
        first_line: Option<String>,
    },

    /// The probe did not finish within the configured timeout and was killed.
    #[error("probe did not finish within {0:?}")]
    Timeout(Duration),

    /// Waiting on the probe process failed.
    #[error("I/O error while waiting for probe: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Whether the interpreter itself is missing from the system.
    pub fn is_missing_interpreter(&self) -> bool {
        matches!(
            self,
            ProbeError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Runs availability scripts against one interpreter.
#[derive(Debug, Clone)]
pub struct AvailabilityProbe {
    interpreter: String,
    timeout: Duration,
}

impl AvailabilityProbe {
    /// Create a probe for `interpreter`, rejecting blank paths.
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Result<Self, ProbeError> {
        let interpreter = interpreter.into();
        if interpreter.trim().is_empty() {
            return Err(ProbeError::BlankInterpreter);
        }
        Ok(Self {
            interpreter,
            timeout,
        })
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check that the interpreter has the packages the sensor scripts need.
    pub fn check_environment(&self) -> Result<bool, ProbeError> {
        let line = self.run(ProbeScript::Environment)?;
        Ok(line.as_deref() == Some(OK))
    }

    /// Check that an eye tracker is connected.
    pub fn check_device(&self) -> Result<bool, ProbeError> {
        let line = self.run(ProbeScript::DevicePresence)?;
        Ok(line.as_deref() == Some(FOUND))
    }

    /// Name of the connected eye tracker, or `None` when there is none.
    pub fn device_name(&self) -> Result<Option<String>, ProbeError> {
        let line = self.run(ProbeScript::DeviceName)?;
        Ok(line.filter(|name| name != NOT_FOUND))
    }

    /// Supported gaze output frequencies, as printed by the vendor SDK.
    pub fn frequencies(&self) -> Result<Vec<String>, ProbeError> {
        let line = self.run(ProbeScript::Frequencies)?;
        Ok(parse_frequencies(line.as_deref()))
    }

    /// Run one of the fixed probe scripts.
    pub fn run(&self, script: ProbeScript) -> Result<Option<String>, ProbeError> {
        self.run_inline(script.source())
    }

    /// Run an arbitrary inline script and return its first output line.
    pub fn run_inline(&self, script: &str) -> Result<Option<String>, ProbeError> {
        let deadline = Instant::now() + self.timeout;

        let (output, writer) = std::io::pipe()?;
        // The temporary command drops the parent's write ends after spawn.
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer)
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                interpreter: self.interpreter.clone(),
                source,
            })?;

        let (line_tx, line_rx) = unbounded();
        forward_lines(output, line_tx);

        let remaining = deadline.saturating_duration_since(Instant::now());
        let first_line = match line_rx.recv_timeout(remaining) {
            Ok(line) => Some(line),
            // Output closed without printing anything.
            Err(RecvTimeoutError::Disconnected) => None,
            Err(RecvTimeoutError::Timeout) => {
                kill_quietly(&mut child);
                return Err(ProbeError::Timeout(self.timeout));
            }
        };
        drop(line_rx);

        let status = wait_until(&mut child, deadline)?.ok_or_else(|| {
            kill_quietly(&mut child);
            ProbeError::Timeout(self.timeout)
        })?;

        debug!(
            interpreter = %self.interpreter,
            %status,
            first_line = ?first_line,
            "probe finished"
        );

        if !status.success() {
            return Err(ProbeError::Failed { status, first_line });
        }
        Ok(first_line)
    }
}

/// Parse a printed tuple such as `(60.0, 120.0)` into its tokens.
///
/// `None`, the not-found sentinel and an empty tuple all yield an empty list.
pub fn parse_frequencies(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    if raw.trim() == NOT_FOUND {
        return Vec::new();
    }
    raw.replace(['(', ')'], "")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn forward_lines<R: Read + Send + 'static>(stream: R, tx: Sender<String>) {
    thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(line.trim_end().to_string()).is_err() {
                break;
            }
        }
    });
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn kill_quietly(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill probe process: {e}");
    }
    let _ = child.wait();
}
