//! The event capture engine.
//!
//! The engine registers one listener per [`EventCategory`] on an
//! [`EventSurface`] and turns host events into journal records. Listener
//! callbacks only touch memory: the journal (behind one coarse mutex), the
//! pending content-change slot, and a channel of snapshot requests. All file
//! I/O happens on a single background worker, which also runs the debounce
//! tick that coalesces rapid edits into one snapshot per tick.
//!
//! ```text
//!  host (UI) thread                         capture worker
//!  ────────────────                         ──────────────
//!  listener ──▶ journal.lock().push(..)
//!           ──▶ pending slot  ◀───── tick ── take + snapshot
//!           ──▶ snapshot_tx  ───────────────▶ SnapshotLogger::log
//! ```

use chrono::Utc;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::snapshot::{SnapshotLogger, SnapshotRequest, SnapshotSource};
use super::surface::{EventSurface, ListenerId};
use super::types::{EditorKind, EventCategory, HostEvent};
use crate::journal::record::{CARET_ID, SELECTION_ID, VISIBLE_AREA_ID};
use crate::journal::{
    ActionRecord, CaretRecord, Environment, FileEventKind, FileRecord, Journal, JournalError,
    MouseRecord, SelectionRecord, SharedJournal, TypingRecord, VisibleAreaRecord,
};
use crate::path::relative_path;
use crate::transparency::{create_shared_log, SharedTransparencyLog, TransparencyStats};

/// Default period of the debounce tick.
pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(50);
/// Shortest debounce tick the worker runs with.
pub const MIN_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(1);

const MAIN_EDITOR_CHANGE_REMARK: &str = "contentChanged | MAIN_EDITOR";
const CONSOLE_CHANGE_REMARK: &str = "contentChanged | CONSOLE";

/// Errors starting or stopping the capture engine.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("project root must not be empty")]
    EmptyProjectRoot,

    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn capture worker: {0}")]
    Worker(#[source] std::io::Error),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

/// Parameters of one capture session.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub session_id: String,
    pub project_root: PathBuf,
    pub output_dir: PathBuf,
    pub debounce_interval: Duration,
    pub code_extensions: Vec<String>,
}

/// What a stopped engine left behind.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub journal_path: PathBuf,
    pub event_count: usize,
    pub stats: TransparencyStats,
}

/// The most recent unflushed edit of a main-editor document.
#[derive(Debug)]
struct PendingChange {
    path: PathBuf,
    text: String,
}

impl PendingChange {
    fn into_request(self) -> SnapshotRequest {
        SnapshotRequest {
            source: SnapshotSource::File(self.path),
            timestamp: now_millis(),
            remark: MAIN_EDITOR_CHANGE_REMARK.to_string(),
            text: Some(self.text),
        }
    }
}

/// State shared by the listeners and the worker.
struct EngineShared {
    recording: AtomicBool,
    project_root: PathBuf,
    journal: SharedJournal,
    stats: SharedTransparencyLog,
    pending: Mutex<Option<PendingChange>>,
    snapshot_tx: Sender<SnapshotRequest>,
}

impl EngineShared {
    fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    fn pending(&self) -> MutexGuard<'_, Option<PendingChange>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn relative(&self, path: Option<&Path>) -> Option<String> {
        path.map(|p| {
            relative_path(p, &self.project_root).unwrap_or_else(|_| p.to_string_lossy().into_owned())
        })
    }

    fn enqueue(&self, source: SnapshotSource, timestamp: i64, remark: &str, text: Option<String>) {
        let request = SnapshotRequest {
            source,
            timestamp,
            remark: remark.to_string(),
            text,
        };
        if self.snapshot_tx.send(request).is_err() {
            warn!("Capture worker is gone; snapshot dropped");
        }
    }

    /// Store the latest edit, handing a displaced edit of another file to the
    /// worker so it is not lost.
    fn set_pending(&self, path: PathBuf, text: String) {
        let mut slot = self.pending();
        if let Some(previous) = slot.take() {
            if previous.path != path && self.snapshot_tx.send(previous.into_request()).is_err() {
                warn!("Capture worker is gone; displaced edit dropped");
            }
        }
        *slot = Some(PendingChange { path, text });
    }

    fn take_pending(&self) -> Option<SnapshotRequest> {
        self.pending().take().map(PendingChange::into_request)
    }

    fn handle(&self, event: &HostEvent) {
        if !self.is_recording() {
            self.stats.record_dropped();
            return;
        }
        if self.record(event) {
            self.stats.record_event(event.category());
        }
    }

    /// Journal one event. Returns whether anything was recorded.
    fn record(&self, event: &HostEvent) -> bool {
        let timestamp = now_millis();
        match event {
            HostEvent::ActionInvoked { action_id, path } => {
                let record = ActionRecord {
                    id: action_id.clone(),
                    timestamp,
                    path: self.relative(path.as_deref()),
                };
                self.journal.lock().actions.push(record);
            }
            HostEvent::Typed {
                character,
                path,
                caret,
            } => {
                let record = TypingRecord {
                    character: character.to_string(),
                    timestamp,
                    path: self.relative(path.as_deref()),
                    line: caret.map(|c| c.line),
                    column: caret.map(|c| c.column),
                };
                self.journal.lock().typings.push(record);
            }
            HostEvent::Mouse { action, path, x, y } => {
                let record = MouseRecord {
                    id: *action,
                    timestamp,
                    path: self.relative(path.as_deref()),
                    x: *x,
                    y: *y,
                };
                self.journal.lock().mouses.push(record);
            }
            HostEvent::CaretMoved { path, position } => {
                let record = CaretRecord {
                    id: CARET_ID.to_string(),
                    timestamp,
                    path: self.relative(path.as_deref()),
                    line: position.line,
                    column: position.column,
                };
                self.journal.lock().carets.push(record);
            }
            HostEvent::SelectionChanged {
                path,
                start,
                end,
                selected_text,
            } => {
                let record = SelectionRecord {
                    id: SELECTION_ID.to_string(),
                    timestamp,
                    path: self.relative(path.as_deref()),
                    start_position: start.to_string(),
                    end_position: end.to_string(),
                    selected_text: selected_text.clone(),
                };
                self.journal.lock().selections.push(record);
            }
            HostEvent::VisibleAreaChanged {
                path,
                editor_kind,
                x,
                y,
                width,
                height,
            } => {
                if *editor_kind != EditorKind::MainEditor {
                    return false;
                }
                let record = VisibleAreaRecord {
                    id: VISIBLE_AREA_ID.to_string(),
                    timestamp,
                    path: self.relative(path.as_deref()),
                    x: *x,
                    y: *y,
                    width: *width,
                    height: *height,
                };
                self.journal.lock().visible_areas.push(record);
            }
            HostEvent::DocumentChanged {
                path,
                editor_kind,
                text,
            } => {
                if text.is_empty() {
                    return false;
                }
                if *editor_kind == EditorKind::Console {
                    self.enqueue(
                        SnapshotSource::Console,
                        timestamp,
                        CONSOLE_CHANGE_REMARK,
                        Some(text.clone()),
                    );
                    return true;
                }
                match path {
                    Some(path) => self.set_pending(path.clone(), text.clone()),
                    None => return false,
                }
            }
            HostEvent::FileOpened { path } => {
                self.record_file(FileEventKind::FileOpened, path, timestamp, "fileOpened");
            }
            HostEvent::FileClosed { path } => {
                self.record_file(FileEventKind::FileClosed, path, timestamp, "fileClosed");
            }
            HostEvent::FileSelectionChanged { old_path, new_path } => {
                let record = FileRecord {
                    id: FileEventKind::SelectionChanged,
                    timestamp,
                    path: None,
                    old_path: self.relative(old_path.as_deref()),
                    new_path: self.relative(new_path.as_deref()),
                };
                self.journal.lock().files.push(record);
                if let Some(old) = old_path {
                    self.enqueue(
                        SnapshotSource::File(old.clone()),
                        timestamp,
                        "selectionChanged | OldFile",
                        None,
                    );
                }
                if let Some(new) = new_path {
                    self.enqueue(
                        SnapshotSource::File(new.clone()),
                        timestamp,
                        "selectionChanged | NewFile",
                        None,
                    );
                }
            }
        }
        true
    }

    fn record_file(&self, kind: FileEventKind, path: &Path, timestamp: i64, remark: &str) {
        let record = FileRecord {
            id: kind,
            timestamp,
            path: self.relative(Some(path)),
            old_path: None,
            new_path: None,
        };
        self.journal.lock().files.push(record);
        self.enqueue(
            SnapshotSource::File(path.to_path_buf()),
            timestamp,
            remark,
            None,
        );
    }
}

/// A running capture session bound to one event surface.
pub struct CaptureEngine {
    shared: Arc<EngineShared>,
    surface: Arc<dyn EventSurface>,
    listeners: Vec<ListenerId>,
    output_dir: PathBuf,
    shutdown_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl CaptureEngine {
    /// Start capturing: spawn the worker, register listeners, and journal the
    /// files that are already open.
    pub fn start(
        surface: Arc<dyn EventSurface>,
        settings: CaptureSettings,
    ) -> Result<Self, CaptureError> {
        if settings.project_root.as_os_str().is_empty() {
            return Err(CaptureError::EmptyProjectRoot);
        }
        std::fs::create_dir_all(&settings.output_dir).map_err(|source| {
            CaptureError::OutputDir {
                path: settings.output_dir.clone(),
                source,
            }
        })?;

        let host = surface.host_info();
        let environment = Environment {
            session_id: settings.session_id.clone(),
            started_at: Some(Utc::now()),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_default(),
            project_path: settings.project_root.to_string_lossy().into_owned(),
            project_name: settings
                .project_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            ide_name: host.ide_name,
            ide_version: host.ide_version,
            screen_width: host.screen_width,
            screen_height: host.screen_height,
        };

        let journal = SharedJournal::new(Journal::new(environment));
        let stats = create_shared_log();
        let (snapshot_tx, snapshot_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let shared = Arc::new(EngineShared {
            recording: AtomicBool::new(true),
            project_root: settings.project_root.clone(),
            journal: journal.clone(),
            stats: Arc::clone(&stats),
            pending: Mutex::new(None),
            snapshot_tx,
        });

        let logger = SnapshotLogger::new(
            &settings.output_dir,
            &settings.project_root,
            &settings.code_extensions,
            journal,
            stats,
        );
        let worker_shared = Arc::clone(&shared);
        let interval = settings.debounce_interval.max(MIN_DEBOUNCE_INTERVAL);
        let worker = thread::Builder::new()
            .name("capture-worker".to_string())
            .spawn(move || run_worker(worker_shared, logger, snapshot_rx, shutdown_rx, interval))
            .map_err(CaptureError::Worker)?;

        let listeners = EventCategory::ALL
            .iter()
            .map(|&category| {
                let shared = Arc::clone(&shared);
                surface.subscribe(category, Arc::new(move |event: &HostEvent| shared.handle(event)))
            })
            .collect();

        let open_files = surface.open_files();
        for path in open_files {
            shared.handle(&HostEvent::FileOpened { path });
        }

        info!(
            session = %settings.session_id,
            output = %settings.output_dir.display(),
            "capture engine started"
        );

        Ok(Self {
            shared,
            surface,
            listeners,
            output_dir: settings.output_dir,
            shutdown_tx: Some(shutdown_tx),
            worker: Some(worker),
        })
    }

    /// Stop recording without releasing listeners or the worker.
    pub fn pause(&self) {
        self.shared.recording.store(false, Ordering::SeqCst);
        debug!("capture paused");
    }

    pub fn resume(&self) {
        self.shared.recording.store(true, Ordering::SeqCst);
        debug!("capture resumed");
    }

    pub fn is_recording(&self) -> bool {
        self.shared.is_recording()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Journal a user-defined label as an action. Ignored while paused.
    pub fn record_label(&self, label: &str) -> bool {
        if !self.shared.is_recording() {
            return false;
        }
        self.shared.journal.lock().actions.push(ActionRecord {
            id: format!("AddLabel.[{label}]"),
            timestamp: now_millis(),
            path: None,
        });
        self.shared.stats.record_event(EventCategory::Action);
        true
    }

    /// A copy of the journal as it stands.
    pub fn journal(&self) -> Journal {
        self.shared.journal.snapshot()
    }

    pub fn stats(&self) -> TransparencyStats {
        self.shared.stats.stats()
    }

    /// Stop capturing: unregister listeners, drain pending snapshots, and
    /// write the journal and statistics into the output directory.
    pub fn stop(mut self) -> Result<CaptureOutcome, CaptureError> {
        self.shutdown();

        let journal = self.shared.journal.snapshot();
        let journal_path = journal.write_to(&self.output_dir)?;
        if let Err(e) = self.shared.stats.save_to(&self.output_dir) {
            warn!("Failed to write session statistics: {e}");
        }

        info!(
            journal = %journal_path.display(),
            events = journal.event_count(),
            "capture engine stopped"
        );

        Ok(CaptureOutcome {
            journal_path,
            event_count: journal.event_count(),
            stats: self.shared.stats.stats(),
        })
    }

    fn shutdown(&mut self) {
        self.shared.recording.store(false, Ordering::SeqCst);

        for id in self.listeners.drain(..) {
            self.surface.unsubscribe(id);
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Capture worker panicked");
            }
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    shared: Arc<EngineShared>,
    logger: SnapshotLogger,
    requests: Receiver<SnapshotRequest>,
    shutdown: Receiver<()>,
    interval: Duration,
) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(requests) -> request => match request {
                Ok(request) => {
                    logger.log(request);
                }
                Err(_) => break,
            },
            recv(ticker) -> _ => {
                if shared.is_recording() {
                    flush_pending(&shared, &logger, &requests);
                }
            }
            recv(shutdown) -> _ => break,
        }
    }

    // Everything captured before stop still gets its snapshot.
    flush_pending(&shared, &logger, &requests);
}

/// Drain queued requests, then snapshot the pending edit.
fn flush_pending(shared: &EngineShared, logger: &SnapshotLogger, requests: &Receiver<SnapshotRequest>) {
    for request in requests.try_iter() {
        logger.log(request);
    }
    if let Some(request) = shared.take_pending() {
        logger.log(request);
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
