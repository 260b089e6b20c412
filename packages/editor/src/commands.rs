//! # Keyboard Command Dispatch
//!
//! Binds external key events to store operations. No tree logic lives here;
//! the commands only name which store operation to run, and saving is
//! surfaced as an effect for the session layer to act on.

use serde::{Deserialize, Serialize};

use crate::store::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditorCommand {
    Undo,
    Redo,
    DeleteSelected,
    SaveNow,
}

/// What happened when a command was dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEffect {
    /// The store changed
    Applied,
    /// Nothing to do (empty history, no selection, stale id)
    Ignored,
    /// Caller should trigger an immediate save
    RequestSave,
}

/// Map a key event descriptor to a command.
///
/// `key` follows the DOM convention (`"z"`, `"Delete"`, `"Backspace"`);
/// `modifier` is Ctrl or Cmd depending on platform.
pub fn command_for_key(key: &str, modifier: bool, shift: bool) -> Option<EditorCommand> {
    match (key, modifier, shift) {
        ("z", true, false) => Some(EditorCommand::Undo),
        ("z", true, true) => Some(EditorCommand::Redo),
        ("y", true, false) => Some(EditorCommand::Redo),
        ("s", true, _) => Some(EditorCommand::SaveNow),
        ("Delete", false, false) | ("Backspace", false, false) => {
            Some(EditorCommand::DeleteSelected)
        }
        _ => None,
    }
}

/// Run a command against the store
pub fn apply_command(store: &mut BlockStore, command: EditorCommand) -> CommandEffect {
    match command {
        EditorCommand::Undo => {
            if store.undo() {
                CommandEffect::Applied
            } else {
                CommandEffect::Ignored
            }
        }
        EditorCommand::Redo => {
            if store.redo() {
                CommandEffect::Applied
            } else {
                CommandEffect::Ignored
            }
        }
        EditorCommand::DeleteSelected => {
            let selected = store.selection().selected().map(str::to_string);
            match selected {
                Some(id) if store.delete(&id) => CommandEffect::Applied,
                _ => CommandEffect::Ignored,
            }
        }
        EditorCommand::SaveNow => CommandEffect::RequestSave,
    }
}
