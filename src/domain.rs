use std::io::Error;

/// Crate wide error type. Everything that can go wrong before or inside
/// the event loop converts into one of these.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("i/o error: {0}")]
    Io(#[from] Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid document: {0}")]
    InvalidData(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
}

#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Terminal event poll interval in milliseconds.
    pub event_poll_time: u64,
    /// Upper bound on how many lines a multiline cell may wrap over.
    pub max_row_height: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            event_poll_time: 100,
            max_row_height: 3,
        }
    }
}

/// User intent, produced by the controller from raw terminal events and
/// consumed by the model. The same message can mean different things
/// depending on which mode the model is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ToggleSort,
    OpenFilter,
    ToggleValue,
    SelectAll,
    SelectNone,
    ClearField,
    CopyCell,
    CopyRow,
    Enter,
    Exit,
    Help,
    Resize(u16, u16),
}

pub const HELP_TEXT: &str = "jgrid key bindings

  q            quit
  Up/Down      move row selection
  Left/Right   move column selection
  PgUp/PgDn    move one page
  Home/End     jump to first/last row
  s            sort by the selected column, press again to reverse order
  f            open the filter panel for the selected column
  Enter        show the selected record in full
  y / Y        copy cell / copy row to the clipboard
  ?            this help
  Esc          leave the current view

Filter panel:
  Up/Down      move value selection
  Left/Right   switch field (hidden columns included)
  Space        include/exclude the selected value
  a / n        select all / select none
  c            clear the filter for this field
  Esc          close the panel";
