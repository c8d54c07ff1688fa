//! Scripted capture demo.
//!
//! Plays a short editing session against an in-process event surface and
//! prints the resulting journal.
//!
//! Run with: cargo run --example capture_demo

use ide_tracker::capture::{EditorKind, HostEvent, HostInfo, LocalSurface, Position};
use ide_tracker::config::{Config, StaticConfigSource};
use ide_tracker::journal::{Journal, MouseAction};
use ide_tracker::session::SessionCoordinator;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    println!("IDE Tracker - Capture Demo");
    println!("==========================");
    println!();

    let project = std::env::temp_dir().join("ide-tracker-demo");
    let source = project.join("src").join("main.rs");
    std::fs::create_dir_all(source.parent().unwrap_or(&project))?;
    std::fs::write(&source, "fn main() {}\n")?;

    let surface = Arc::new(
        LocalSurface::new(HostInfo {
            ide_name: "DemoIDE".to_string(),
            ide_version: "1.0".to_string(),
            screen_width: 1920,
            screen_height: 1080,
        })
        .with_open_files([source.clone()]),
    );
    let config = StaticConfigSource(Some(Config::default()));
    let mut coordinator = SessionCoordinator::new(Arc::new(config), surface.clone());

    let output_dir = coordinator.start(&project)?.to_path_buf();
    println!("Session output: {}", output_dir.display());

    let mut text = String::from("fn main() {\n    ");
    for (column, character) in "println!(\"hi\");".chars().enumerate() {
        surface.dispatch(&HostEvent::Typed {
            character,
            path: Some(source.clone()),
            caret: Some(Position::new(2, 4 + column as u32)),
        });
        text.push(character);
        surface.dispatch(&HostEvent::DocumentChanged {
            path: Some(source.clone()),
            editor_kind: EditorKind::MainEditor,
            text: format!("{text}\n}}\n"),
        });
        thread::sleep(Duration::from_millis(5));
    }

    coordinator.add_label("finished typing")?;
    coordinator.pause()?;
    surface.dispatch(&HostEvent::Mouse {
        action: MouseAction::MouseClicked,
        path: Some(source.clone()),
        x: 400,
        y: 300,
    });
    coordinator.resume()?;

    surface.dispatch(&HostEvent::ActionInvoked {
        action_id: "RunClass".to_string(),
        path: Some(source.clone()),
    });
    surface.dispatch(&HostEvent::DocumentChanged {
        path: None,
        editor_kind: EditorKind::Console,
        text: "hi\n".to_string(),
    });

    let summary = coordinator.stop()?;
    let journal = Journal::read_from(&summary.journal_path)?;

    println!();
    println!("Keystrokes: {}", journal.typings.len());
    println!("Actions: {}", journal.actions.len());
    println!("Pointer events (paused click dropped): {}", journal.mouses.len());
    println!("Snapshots: {}", journal.logs.len());
    for log in &journal.logs {
        println!("  [{}] {} {}", log.timestamp, log.path, log.remark);
    }
    println!();
    println!("Journal: {}", summary.journal_path.display());

    Ok(())
}
