//! In-memory session journal.
//!
//! The journal is a fixed set of sections, each an insertion-ordered list of
//! records. It is built up during a session behind a single mutex and written
//! once, as pretty-printed JSON, when the session stops.

pub mod record;

pub use record::{
    ActionRecord, CaretRecord, Environment, FileEventKind, FileRecord, LogRecord, MouseAction,
    MouseRecord, SelectionRecord, TypingRecord, VisibleAreaRecord,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// File name of the journal inside the session output directory.
pub const JOURNAL_FILE_NAME: &str = "ide_tracking.json";

/// Errors writing or reading a journal file.
#[derive(Error, Debug)]
pub enum JournalError {
    #[error("journal I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("journal serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The session journal. Every section is always present, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub environment: Environment,
    pub logs: Vec<LogRecord>,
    pub actions: Vec<ActionRecord>,
    pub typings: Vec<TypingRecord>,
    pub files: Vec<FileRecord>,
    pub mouses: Vec<MouseRecord>,
    pub carets: Vec<CaretRecord>,
    pub selections: Vec<SelectionRecord>,
    pub visible_areas: Vec<VisibleAreaRecord>,
}

impl Journal {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    /// Total number of event records across all sections.
    pub fn event_count(&self) -> usize {
        self.logs.len()
            + self.actions.len()
            + self.typings.len()
            + self.files.len()
            + self.mouses.len()
            + self.carets.len()
            + self.selections.len()
            + self.visible_areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    /// Write the journal to `dir/ide_tracking.json`, creating `dir` if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, JournalError> {
        std::fs::create_dir_all(dir).map_err(|source| JournalError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(JOURNAL_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| JournalError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Read a journal previously written with [`Journal::write_to`].
    pub fn read_from(path: &Path) -> Result<Self, JournalError> {
        let content = std::fs::read_to_string(path).map_err(|source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Journal shared between listener callbacks and the capture worker.
#[derive(Debug, Clone, Default)]
pub struct SharedJournal {
    inner: Arc<Mutex<Journal>>,
}

impl SharedJournal {
    pub fn new(journal: Journal) -> Self {
        Self {
            inner: Arc::new(Mutex::new(journal)),
        }
    }

    /// Lock the journal for mutation.
    ///
    /// A panic in one listener must not cost the rest of the session, so a
    /// poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, Journal> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Clone the current journal contents.
    pub fn snapshot(&self) -> Journal {
        self.lock().clone()
    }
}
