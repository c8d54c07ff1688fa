//! Content snapshots.
//!
//! Each snapshot copies the text of a changed file into its own
//! `<output>/logs/<timestamp>-<seq>.log` artifact, or appends console text to
//! `<output>/logs/<timestamp>.log`, and adds a `fileLog` record naming the
//! artifact to the journal. Failures are recorded in the record's remark;
//! they never abort the session.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::journal::{record::FILE_LOG_ID, LogRecord, SharedJournal};
use crate::path::relative_path;
use crate::transparency::SharedTransparencyLog;

/// Path recorded for console buffers, which have no backing file.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Remark suffix for files that are not source code.
pub const NOT_CODE_FILE_REMARK: &str = " | NotCodeFile | Fail";
/// Remark suffix for snapshots that failed on I/O.
pub const IO_ERROR_REMARK: &str = " | IoError | Fail";

/// Extensions treated as source code when no list is configured.
pub const DEFAULT_CODE_EXTENSIONS: &[&str] = &[
    "java", "cpp", "c", "h", "hpp", "py", "rb", "js", "ts", "go", "rs", "md",
];

/// Where a snapshot's content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    /// A console or output buffer; the literal text is appended.
    Console,
    File(PathBuf),
}

/// One pending snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub source: SnapshotSource,
    pub timestamp: i64,
    pub remark: String,
    /// Unsaved editor text; when absent the file is copied from disk.
    pub text: Option<String>,
}

/// Writes snapshot artifacts and their journal records.
#[derive(Debug, Clone)]
pub struct SnapshotLogger {
    logs_dir: PathBuf,
    project_root: PathBuf,
    code_extensions: Vec<String>,
    journal: SharedJournal,
    stats: SharedTransparencyLog,
    sequence: Arc<AtomicU64>,
}

impl SnapshotLogger {
    pub fn new(
        output_dir: &Path,
        project_root: &Path,
        code_extensions: &[String],
        journal: SharedJournal,
        stats: SharedTransparencyLog,
    ) -> Self {
        let code_extensions = code_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            logs_dir: output_dir.join("logs"),
            project_root: project_root.to_path_buf(),
            code_extensions,
            journal,
            stats,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Whether `path` has one of the recognized source-code extensions.
    pub fn is_code_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.code_extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    /// Take one snapshot and journal it. Returns the journal record.
    pub fn log(&self, request: SnapshotRequest) -> LogRecord {
        let SnapshotRequest {
            source,
            timestamp,
            mut remark,
            text,
        } = request;
        let artifact = match &source {
            SnapshotSource::Console => {
                let name = format!("{timestamp}.log");
                let written = self.attempt(&name, &mut remark, |dest| {
                    append_text(dest, text.as_deref().unwrap_or_default())
                });
                written.then_some(name)
            }
            SnapshotSource::File(path) if self.is_code_file(path) => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
                let name = format!("{timestamp}-{seq}.log");
                let written = self.attempt(&name, &mut remark, |dest| match text.as_deref() {
                    Some(text) => fs::write(dest, text),
                    None => fs::copy(path, dest).map(|_| ()),
                });
                written.then_some(name)
            }
            SnapshotSource::File(_) => {
                remark.push_str(NOT_CODE_FILE_REMARK);
                None
            }
        };
        self.stats.record_snapshot(artifact.is_some());

        let record = LogRecord {
            id: FILE_LOG_ID.to_string(),
            timestamp,
            path: self.journal_path(&source),
            remark,
            artifact,
        };
        debug!(path = %record.path, remark = %record.remark, "snapshot logged");
        self.journal.lock().logs.push(record.clone());
        record
    }

    fn attempt(
        &self,
        name: &str,
        remark: &mut String,
        write: impl FnOnce(&Path) -> std::io::Result<()>,
    ) -> bool {
        let artifact = self.logs_dir.join(name);
        let result = fs::create_dir_all(&self.logs_dir).and_then(|_| write(&artifact));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Snapshot to {} failed: {e}", artifact.display());
                remark.push_str(IO_ERROR_REMARK);
                false
            }
        }
    }

    fn journal_path(&self, source: &SnapshotSource) -> String {
        match source {
            SnapshotSource::Console => UNKNOWN_SOURCE.to_string(),
            SnapshotSource::File(path) => relative_path(path, &self.project_root)
                .unwrap_or_else(|_| path.to_string_lossy().into_owned()),
        }
    }
}

fn append_text(dest: &Path, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(dest)?;
    file.write_all(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Journal;
    use crate::transparency::create_shared_log;

    fn logger(output: &Path, project: &Path) -> (SnapshotLogger, SharedJournal) {
        let journal = SharedJournal::new(Journal::default());
        let extensions: Vec<String> = DEFAULT_CODE_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect();
        let logger = SnapshotLogger::new(
            output,
            project,
            &extensions,
            journal.clone(),
            create_shared_log(),
        );
        (logger, journal)
    }

    #[test]
    fn test_code_file_is_copied_from_disk() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = project.path().join("src").join("main.rs");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "fn main() {}\n").unwrap();

        let (logger, journal) = logger(output.path(), project.path());
        let record = logger.log(SnapshotRequest {
            source: SnapshotSource::File(source),
            timestamp: 1000,
            remark: "fileOpened".to_string(),
            text: None,
        });

        assert_eq!(record.remark, "fileOpened");
        assert_eq!(record.path, "src/main.rs");
        assert_eq!(record.artifact.as_deref(), Some("1000-0.log"));
        let copied = fs::read_to_string(output.path().join("logs").join("1000-0.log")).unwrap();
        assert_eq!(copied, "fn main() {}\n");
        assert_eq!(journal.snapshot().logs, vec![record]);
    }

    #[test]
    fn test_literal_text_is_written_instead_of_disk_content() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = project.path().join("a.py");
        fs::write(&source, "old").unwrap();

        let (logger, _journal) = logger(output.path(), project.path());
        logger.log(SnapshotRequest {
            source: SnapshotSource::File(source),
            timestamp: 7,
            remark: "contentChanged | MAIN_EDITOR".to_string(),
            text: Some("print('new')".to_string()),
        });

        let written = fs::read_to_string(output.path().join("logs").join("7-0.log")).unwrap();
        assert_eq!(written, "print('new')");
    }

    #[test]
    fn test_non_code_file_is_annotated_and_not_written() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let source = project.path().join("image.png");
        fs::write(&source, [0u8, 1, 2]).unwrap();

        let (logger, journal) = logger(output.path(), project.path());
        let record = logger.log(SnapshotRequest {
            source: SnapshotSource::File(source),
            timestamp: 5,
            remark: "fileOpened".to_string(),
            text: None,
        });

        assert_eq!(record.remark, format!("fileOpened{NOT_CODE_FILE_REMARK}"));
        assert_eq!(record.artifact, None);
        assert!(!output.path().join("logs").exists());
        assert_eq!(journal.snapshot().logs.len(), 1);
    }

    #[test]
    fn test_missing_file_is_recorded_as_io_failure() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let (logger, journal) = logger(output.path(), project.path());
        let record = logger.log(SnapshotRequest {
            source: SnapshotSource::File(project.path().join("gone.java")),
            timestamp: 9,
            remark: "fileClosed".to_string(),
            text: None,
        });

        assert_eq!(record.remark, format!("fileClosed{IO_ERROR_REMARK}"));
        assert_eq!(record.path, "gone.java");
        assert_eq!(record.artifact, None);
        assert_eq!(journal.snapshot().logs, vec![record]);
    }

    #[test]
    fn test_console_text_is_appended() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        let (logger, _journal) = logger(output.path(), project.path());
        for chunk in ["first\n", "second\n"] {
            let record = logger.log(SnapshotRequest {
                source: SnapshotSource::Console,
                timestamp: 11,
                remark: "contentChanged | CONSOLE".to_string(),
                text: Some(chunk.to_string()),
            });
            assert_eq!(record.path, UNKNOWN_SOURCE);
            assert_eq!(record.artifact.as_deref(), Some("11.log"));
        }

        let written = fs::read_to_string(output.path().join("logs").join("11.log")).unwrap();
        assert_eq!(written, "first\nsecond\n");
    }

    #[test]
    fn test_same_millisecond_snapshots_get_separate_artifacts() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let old = project.path().join("old.py");
        let new = project.path().join("new.py");
        fs::write(&old, "OLD CONTENT").unwrap();
        fs::write(&new, "NEW CONTENT").unwrap();

        let (logger, _journal) = logger(output.path(), project.path());
        let records: Vec<LogRecord> = [(old, None), (new, None)]
            .into_iter()
            .chain([(project.path().join("a.rs"), Some("A"))])
            .chain([(project.path().join("b.rs"), Some("B"))])
            .map(|(path, text)| {
                logger.log(SnapshotRequest {
                    source: SnapshotSource::File(path),
                    timestamp: 42,
                    remark: "selectionChanged".to_string(),
                    text: text.map(str::to_string),
                })
            })
            .collect();

        let contents: Vec<String> = records
            .iter()
            .map(|r| {
                let name = r.artifact.as_deref().unwrap();
                fs::read_to_string(output.path().join("logs").join(name)).unwrap()
            })
            .collect();
        assert_eq!(contents, vec!["OLD CONTENT", "NEW CONTENT", "A", "B"]);
        assert_eq!(fs::read_dir(output.path().join("logs")).unwrap().count(), 4);
    }

    #[test]
    fn test_extension_matching_ignores_case_and_dots() {
        let output = tempfile::tempdir().unwrap();
        let logger = SnapshotLogger::new(
            output.path(),
            Path::new("/proj"),
            &[".Go".to_string()],
            SharedJournal::default(),
            create_shared_log(),
        );
        assert!(logger.is_code_file(Path::new("/proj/main.GO")));
        assert!(!logger.is_code_file(Path::new("/proj/main.rs")));
        assert!(!logger.is_code_file(Path::new("/proj/Makefile")));
    }
}
