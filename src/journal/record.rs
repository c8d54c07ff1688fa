//! Typed journal records.
//!
//! Every record carries the capture timestamp in epoch milliseconds and the
//! project-relative path of the file it concerns (`None` when the host could
//! not associate a file with the event).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of content snapshot records.
pub const FILE_LOG_ID: &str = "fileLog";
/// Identifier of caret records.
pub const CARET_ID: &str = "caretPositionChanged";
/// Identifier of selection records.
pub const SELECTION_ID: &str = "selectionChanged";
/// Identifier of viewport records.
pub const VISIBLE_AREA_ID: &str = "visibleAreaChanged";

/// Static information about the session and the host it ran in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub session_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub hostname: String,
    pub project_path: String,
    pub project_name: String,
    pub ide_name: String,
    pub ide_version: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// A command invoked in the IDE, captured just before it executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub timestamp: i64,
    pub path: Option<String>,
}

/// A typed character and the caret position it was typed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingRecord {
    pub character: String,
    pub timestamp: i64,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// File lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileEventKind {
    FileOpened,
    FileClosed,
    SelectionChanged,
}

/// A file opened, closed, or brought into focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileEventKind,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
}

/// A content snapshot taken of a file or console buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub timestamp: i64,
    pub path: String,
    pub remark: String,
    /// File name of the artifact under `logs/`, when one was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

/// Pointer event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseAction {
    MousePressed,
    MouseClicked,
    MouseReleased,
    MouseMoved,
    MouseDragged,
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseRecord {
    pub id: MouseAction,
    pub timestamp: i64,
    pub path: Option<String>,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaretRecord {
    pub id: String,
    pub timestamp: i64,
    pub path: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// A selection change; positions are rendered as `line:column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRecord {
    pub id: String,
    pub timestamp: i64,
    pub path: Option<String>,
    pub start_position: String,
    pub end_position: String,
    pub selected_text: Option<String>,
}

/// A scroll or resize of the main editor viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleAreaRecord {
    pub id: String,
    pub timestamp: i64,
    pub path: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}
