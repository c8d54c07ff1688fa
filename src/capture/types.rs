//! Host event model.
//!
//! These are the events an IDE host delivers to the capture engine. Paths are
//! absolute; the engine makes them project-relative when it journals them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::journal::MouseAction;

/// Listener categories. The engine registers exactly one listener for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Action,
    Typing,
    Mouse,
    Caret,
    Selection,
    VisibleArea,
    Document,
    File,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        EventCategory::Action,
        EventCategory::Typing,
        EventCategory::Mouse,
        EventCategory::Caret,
        EventCategory::Selection,
        EventCategory::VisibleArea,
        EventCategory::Document,
        EventCategory::File,
    ];
}

/// The kind of editor surface an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKind {
    /// The primary source-code editor.
    #[default]
    MainEditor,
    /// A console or run-output buffer.
    Console,
    /// Diff views, previews and other auxiliary editors.
    Preview,
    Other,
}

/// A logical position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An event delivered by the IDE host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// A command is about to run.
    ActionInvoked {
        action_id: String,
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// A character is about to be typed into an editor.
    Typed {
        character: char,
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        caret: Option<Position>,
    },
    Mouse {
        action: MouseAction,
        #[serde(default)]
        path: Option<PathBuf>,
        x: i32,
        y: i32,
    },
    CaretMoved {
        #[serde(default)]
        path: Option<PathBuf>,
        position: Position,
    },
    SelectionChanged {
        #[serde(default)]
        path: Option<PathBuf>,
        start: Position,
        end: Position,
        #[serde(default)]
        selected_text: Option<String>,
    },
    VisibleAreaChanged {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        editor_kind: EditorKind,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    /// The full text of a document after an edit.
    DocumentChanged {
        #[serde(default)]
        path: Option<PathBuf>,
        #[serde(default)]
        editor_kind: EditorKind,
        text: String,
    },
    FileOpened {
        path: PathBuf,
    },
    FileClosed {
        path: PathBuf,
    },
    /// Focus moved from one editor tab to another.
    FileSelectionChanged {
        #[serde(default)]
        old_path: Option<PathBuf>,
        #[serde(default)]
        new_path: Option<PathBuf>,
    },
}

impl HostEvent {
    /// The listener category this event is delivered to.
    pub fn category(&self) -> EventCategory {
        match self {
            HostEvent::ActionInvoked { .. } => EventCategory::Action,
            HostEvent::Typed { .. } => EventCategory::Typing,
            HostEvent::Mouse { .. } => EventCategory::Mouse,
            HostEvent::CaretMoved { .. } => EventCategory::Caret,
            HostEvent::SelectionChanged { .. } => EventCategory::Selection,
            HostEvent::VisibleAreaChanged { .. } => EventCategory::VisibleArea,
            HostEvent::DocumentChanged { .. } => EventCategory::Document,
            HostEvent::FileOpened { .. }
            | HostEvent::FileClosed { .. }
            | HostEvent::FileSelectionChanged { .. } => EventCategory::File,
        }
    }

    /// The file the event is primarily about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            HostEvent::ActionInvoked { path, .. }
            | HostEvent::Typed { path, .. }
            | HostEvent::Mouse { path, .. }
            | HostEvent::CaretMoved { path, .. }
            | HostEvent::SelectionChanged { path, .. }
            | HostEvent::VisibleAreaChanged { path, .. }
            | HostEvent::DocumentChanged { path, .. } => path.as_deref(),
            HostEvent::FileOpened { path } | HostEvent::FileClosed { path } => Some(path),
            HostEvent::FileSelectionChanged { new_path, .. } => new_path.as_deref(),
        }
    }
}

/// Static facts about the host, recorded in the journal environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub ide_name: String,
    pub ide_version: String,
    pub screen_width: u32,
    pub screen_height: u32,
}
