//! Integration tests for tracking sessions.

use ide_tracker::capture::{EditorKind, HostEvent, HostInfo, LocalSurface, Position};
use ide_tracker::config::{Config, FileConfigSource, StaticConfigSource};
use ide_tracker::journal::{Journal, MouseAction, JOURNAL_FILE_NAME};
use ide_tracker::session::{SessionCoordinator, SessionError, SessionState};
use ide_tracker::trackers::{ScreenRecorder, TrackerError};
use ide_tracker::transparency::STATS_FILE_NAME;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn surface() -> Arc<LocalSurface> {
    Arc::new(LocalSurface::new(HostInfo {
        ide_name: "TestIDE".to_string(),
        ide_version: "2024.1".to_string(),
        screen_width: 2560,
        screen_height: 1440,
    }))
}

fn config_for(output: &Path) -> Config {
    Config {
        data_output_path: output.to_string_lossy().into_owned(),
        ..Config::default()
    }
}

fn coordinator(config: Config) -> (SessionCoordinator, Arc<LocalSurface>) {
    let surface = surface();
    let coordinator =
        SessionCoordinator::new(Arc::new(StaticConfigSource(Some(config))), surface.clone());
    (coordinator, surface)
}

fn caret(path: &Path, line: u32) -> HostEvent {
    HostEvent::CaretMoved {
        path: Some(path.to_path_buf()),
        position: Position::new(line, 0),
    }
}

fn edit(path: &Path, text: &str) -> HostEvent {
    HostEvent::DocumentChanged {
        path: Some(path.to_path_buf()),
        editor_kind: EditorKind::MainEditor,
        text: text.to_string(),
    }
}

#[test]
fn test_missing_config_file_keeps_coordinator_idle() {
    let project = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let source = FileConfigSource::new(config_dir.path().join("config.json"));
    let mut coordinator = SessionCoordinator::new(Arc::new(source), surface());

    match coordinator.start(project.path()) {
        Err(SessionError::ConfigMissing(location)) => assert!(location.ends_with("config.json")),
        other => panic!("expected missing configuration, got {other:?}"),
    }
    assert_eq!(coordinator.state(), SessionState::Idle);
    assert!(std::fs::read_dir(project.path()).unwrap().next().is_none());
}

#[test]
fn test_config_is_reread_at_every_start() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let config_path = config_dir.path().join("config.json");
    let source = FileConfigSource::new(&config_path);
    let mut coordinator = SessionCoordinator::new(Arc::new(source), surface());

    assert!(coordinator.start(project.path()).is_err());

    config_for(output.path()).save_to(&config_path).unwrap();
    let output_dir = coordinator.start(project.path()).unwrap().to_path_buf();
    assert!(output_dir.starts_with(output.path()));
    coordinator.stop().unwrap();
}

#[test]
fn test_empty_session_has_every_section() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, _surface) = coordinator(config_for(output.path()));

    coordinator.start(project.path()).unwrap();
    let summary = coordinator.stop().unwrap();

    assert_eq!(summary.event_count, 0);
    assert_eq!(
        summary.journal_path,
        summary.output_dir.join(JOURNAL_FILE_NAME)
    );
    assert!(summary.output_dir.join(STATS_FILE_NAME).exists());

    let raw = std::fs::read_to_string(&summary.journal_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for section in [
        "logs",
        "actions",
        "typings",
        "files",
        "mouses",
        "carets",
        "selections",
        "visible_areas",
    ] {
        assert_eq!(value[section], serde_json::json!([]), "section {section}");
    }

    let journal = Journal::read_from(&summary.journal_path).unwrap();
    assert_eq!(journal.environment.ide_name, "TestIDE");
    assert_eq!(journal.environment.screen_width, 2560);
    assert_eq!(journal.environment.session_id, summary.session_id);
    assert_eq!(
        journal.environment.project_path,
        project.path().to_string_lossy()
    );
}

#[test]
fn test_interleaved_events_keep_capture_order() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, surface) = coordinator(config_for(output.path()));
    let file = project.path().join("src").join("lib.rs");

    coordinator.start(project.path()).unwrap();
    for i in 0..5u32 {
        surface.dispatch(&caret(&file, i));
        surface.dispatch(&HostEvent::Mouse {
            action: MouseAction::MouseMoved,
            path: Some(file.clone()),
            x: i as i32,
            y: 0,
        });
        surface.dispatch(&HostEvent::Typed {
            character: char::from(b'a' + i as u8),
            path: Some(file.clone()),
            caret: Some(Position::new(i, 1)),
        });
    }
    let summary = coordinator.stop().unwrap();
    let journal = Journal::read_from(&summary.journal_path).unwrap();

    let lines: Vec<u32> = journal.carets.iter().map(|c| c.line).collect();
    assert_eq!(lines, vec![0, 1, 2, 3, 4]);
    let xs: Vec<i32> = journal.mouses.iter().map(|m| m.x).collect();
    assert_eq!(xs, vec![0, 1, 2, 3, 4]);
    let typed: String = journal.typings.iter().map(|t| t.character.as_str()).collect();
    assert_eq!(typed, "abcde");
    assert!(journal
        .typings
        .iter()
        .all(|t| t.path.as_deref() == Some("src/lib.rs")));
    assert_eq!(summary.event_count, 15);
}

#[test]
fn test_pause_resume_round_trip() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, surface) = coordinator(config_for(output.path()));
    let file = project.path().join("a.rs");

    coordinator.start(project.path()).unwrap();
    surface.dispatch(&caret(&file, 1));
    coordinator.pause().unwrap();
    surface.dispatch(&caret(&file, 2));
    surface.dispatch(&HostEvent::ActionInvoked {
        action_id: "Paste".to_string(),
        path: None,
    });
    coordinator.resume().unwrap();
    surface.dispatch(&caret(&file, 3));

    let summary = coordinator.stop().unwrap();
    let journal = Journal::read_from(&summary.journal_path).unwrap();

    let lines: Vec<u32> = journal.carets.iter().map(|c| c.line).collect();
    assert_eq!(lines, vec![1, 3]);
    assert!(journal.carets[0].timestamp <= journal.carets[1].timestamp);
    assert!(journal.actions.is_empty());
    assert_eq!(summary.stats.dropped_while_paused, 2);
}

#[test]
fn test_events_after_stop_are_not_recorded() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, surface) = coordinator(config_for(output.path()));
    let file = project.path().join("a.rs");

    coordinator.start(project.path()).unwrap();
    surface.dispatch(&caret(&file, 1));
    let summary = coordinator.stop().unwrap();

    assert_eq!(surface.listener_count(), 0);
    assert_eq!(surface.dispatch(&caret(&file, 2)), 0);

    let journal = Journal::read_from(&summary.journal_path).unwrap();
    assert_eq!(journal.carets.len(), 1);
}

#[test]
fn test_debounce_keeps_latest_edit_of_each_file() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = Config {
        debounce_interval: Duration::from_secs(3600),
        ..config_for(output.path())
    };
    let (mut coordinator, surface) = coordinator(config);
    let a = project.path().join("a.rs");
    let b = project.path().join("b.rs");

    coordinator.start(project.path()).unwrap();
    for i in 0..20 {
        surface.dispatch(&edit(&a, &format!("// a {i}")));
    }
    surface.dispatch(&edit(&b, "// b 0"));
    surface.dispatch(&edit(&b, "// b 1"));
    let summary = coordinator.stop().unwrap();

    let journal = Journal::read_from(&summary.journal_path).unwrap();
    let paths: Vec<&str> = journal.logs.iter().map(|l| l.path.as_str()).collect();
    assert_eq!(paths, vec!["a.rs", "b.rs"]);

    let logs_dir = summary.output_dir.join("logs");
    let contents: Vec<String> = journal
        .logs
        .iter()
        .map(|l| std::fs::read_to_string(logs_dir.join(l.artifact.as_deref().unwrap())).unwrap())
        .collect();
    assert_eq!(contents, vec!["// a 19", "// b 1"]);
}

#[test]
fn test_file_focus_change_snapshots_both_files() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, surface) = coordinator(config_for(output.path()));
    let old = project.path().join("old.py");
    let new = project.path().join("notes.txt");
    std::fs::write(&old, "print('old')\n").unwrap();
    std::fs::write(&new, "notes").unwrap();

    coordinator.start(project.path()).unwrap();
    surface.dispatch(&HostEvent::FileSelectionChanged {
        old_path: Some(old.clone()),
        new_path: Some(new.clone()),
    });
    let summary = coordinator.stop().unwrap();
    let journal = Journal::read_from(&summary.journal_path).unwrap();

    assert_eq!(journal.files.len(), 1);
    assert_eq!(journal.files[0].old_path.as_deref(), Some("old.py"));
    assert_eq!(journal.files[0].new_path.as_deref(), Some("notes.txt"));

    let remarks: Vec<&str> = journal.logs.iter().map(|l| l.remark.as_str()).collect();
    assert_eq!(
        remarks,
        vec![
            "selectionChanged | OldFile",
            "selectionChanged | NewFile | NotCodeFile | Fail",
        ]
    );
    assert_eq!(summary.stats.snapshots_written, 1);
    assert_eq!(summary.stats.snapshots_failed, 1);
}

#[test]
fn test_focus_change_between_code_files_keeps_both_contents() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let (mut coordinator, surface) = coordinator(config_for(output.path()));
    let old = project.path().join("old.py");
    let new = project.path().join("new.py");
    std::fs::write(&old, "OLD CONTENT").unwrap();
    std::fs::write(&new, "NEW CONTENT").unwrap();

    coordinator.start(project.path()).unwrap();
    surface.dispatch(&HostEvent::FileSelectionChanged {
        old_path: Some(old.clone()),
        new_path: Some(new.clone()),
    });
    let summary = coordinator.stop().unwrap();
    let journal = Journal::read_from(&summary.journal_path).unwrap();

    assert_eq!(journal.logs.len(), 2);
    assert_eq!(journal.logs[0].timestamp, journal.logs[1].timestamp);
    let logs_dir = summary.output_dir.join("logs");
    let resolved: Vec<(&str, String)> = journal
        .logs
        .iter()
        .map(|l| {
            let artifact = logs_dir.join(l.artifact.as_deref().unwrap());
            (l.path.as_str(), std::fs::read_to_string(artifact).unwrap())
        })
        .collect();
    assert_eq!(
        resolved,
        vec![
            ("old.py", "OLD CONTENT".to_string()),
            ("new.py", "NEW CONTENT".to_string()),
        ]
    );
    assert_eq!(std::fs::read_dir(&logs_dir).unwrap().count(), 2);
    assert_eq!(summary.stats.snapshots_written, 2);
}

struct RecordingRecorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScreenRecorder for RecordingRecorder {
    fn start(&mut self, _output_dir: &Path) -> Result<(), TrackerError> {
        self.calls.lock().unwrap().push("start".to_string());
        Ok(())
    }

    fn pause(&mut self) -> Result<(), TrackerError> {
        self.calls.lock().unwrap().push("pause".to_string());
        Ok(())
    }

    fn resume(&mut self) -> Result<(), TrackerError> {
        self.calls.lock().unwrap().push("resume".to_string());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TrackerError> {
        self.calls.lock().unwrap().push("stop".to_string());
        Ok(())
    }
}

#[test]
fn test_screen_capture_follows_session_lifecycle() {
    let project = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = Config {
        checkboxes: vec![true, false, true],
        ..config_for(output.path())
    };
    let calls = Arc::new(Mutex::new(Vec::new()));
    let factory_calls = Arc::clone(&calls);
    let mut coordinator =
        SessionCoordinator::new(Arc::new(StaticConfigSource(Some(config))), surface())
            .with_recorder(move || {
                Box::new(RecordingRecorder {
                    calls: Arc::clone(&factory_calls),
                }) as Box<dyn ScreenRecorder>
            });

    coordinator.start(project.path()).unwrap();
    coordinator.pause().unwrap();
    coordinator.resume().unwrap();
    coordinator.stop().unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["start", "pause", "resume", "stop"]
    );
}

#[cfg(unix)]
mod sensor {
    use super::*;
    use ide_tracker::probe::ProbeError;
    use ide_tracker::trackers::{GazeLog, GAZE_FILE_NAME};
    use std::os::unix::fs::PermissionsExt;

    /// A stand-in interpreter: a shell script that ignores `-c <script>`.
    fn fake_interpreter(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-python");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    fn sensor_config(output: &Path, interpreter: &Path, device: u32) -> Config {
        Config {
            checkboxes: vec![true, true, false],
            python_interpreter: interpreter.to_string_lossy().into_owned(),
            eye_tracker_device: device,
            probe_timeout: Duration::from_secs(5),
            ..config_for(output)
        }
    }

    #[test]
    fn test_unavailable_environment_aborts_start() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let interpreter = fake_interpreter(bin.path(), "echo 'Not Found'");
        let (mut coordinator, surface) = coordinator(sensor_config(output.path(), &interpreter, 0));

        let err = coordinator.start(project.path()).unwrap_err();
        assert!(matches!(err, SessionError::EnvironmentUnavailable(_)));
        assert_eq!(coordinator.state(), SessionState::Idle);
        assert_eq!(surface.listener_count(), 0);
        assert!(std::fs::read_dir(output.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_failing_probe_is_an_error_not_a_negative_answer() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let interpreter = fake_interpreter(bin.path(), "echo OK; exit 2");
        let (mut coordinator, _surface) = coordinator(sensor_config(output.path(), &interpreter, 0));

        let err = coordinator.start(project.path()).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Probe(ProbeError::Failed { .. })
        ));
        assert_eq!(coordinator.state(), SessionState::Idle);
    }

    #[test]
    fn test_missing_device_aborts_start() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let interpreter = fake_interpreter(
            bin.path(),
            r#"case "$2" in *tobii_research*) echo 'Not Found' ;; *) echo OK ;; esac"#,
        );
        let (mut coordinator, _surface) = coordinator(sensor_config(output.path(), &interpreter, 1));

        let err = coordinator.start(project.path()).unwrap_err();
        assert!(matches!(err, SessionError::DeviceUnavailable));
        assert_eq!(coordinator.state(), SessionState::Idle);
    }

    #[test]
    fn test_simulated_sensor_session_writes_gaze_log() {
        let project = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let bin = tempfile::tempdir().unwrap();
        let interpreter = fake_interpreter(bin.path(), "echo OK");
        let (mut coordinator, _surface) = coordinator(sensor_config(output.path(), &interpreter, 0));

        coordinator.start(project.path()).unwrap();
        coordinator.pause().unwrap();
        coordinator.resume().unwrap();
        let summary = coordinator.stop().unwrap();

        let log = GazeLog::read_from(&summary.output_dir.join(GAZE_FILE_NAME)).unwrap();
        assert!(log.simulated);
        assert_eq!(log.device_index, 0);
        assert!(log.samples.len() <= 1);
    }
}
