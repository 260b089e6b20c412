//! # Pagecraft Editor
//!
//! Core block-tree editing engine for Pagecraft.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ renderers / settings forms (external)       │
//! └─────────────────────────────────────────────┘
//!                     ↓ mutation API
//! ┌─────────────────────────────────────────────┐
//! │ editor: BlockStore                          │
//! │  - add / update / delete / reorder          │
//! │  - dirty flag + change sequence             │
//! │  - snapshot history (undo/redo)             │
//! │  - selection tracking                       │
//! └─────────────────────────────────────────────┘
//!                     ↓ snapshots
//! ┌─────────────────────────────────────────────┐
//! │ workspace: autosave + persistence           │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The store is the single writer**: renderers and the reorder planner
//!    never touch the block collection directly; everything funnels through
//!    the mutation API, which is the only source of dirty-flag transitions
//!    and history snapshots.
//! 2. **Stale ids are routine**: operating on an id that no longer exists is
//!    a silent no-op, not an error. UI events race against state changes and
//!    the engine must shrug that off.
//! 3. **Structural violations are rejected whole**: a reorder batch that
//!    would dangle a parent reference or create a cycle leaves the tree
//!    untouched.
//! 4. **History is linear**: a new edit after an undo truncates the redo
//!    branch; snapshots are full copies of the block collection.

mod block;
mod commands;
mod errors;
mod history;
mod reorder;
mod selection;
mod store;

pub use block::{Block, BlockType};
pub use commands::{apply_command, command_for_key, CommandEffect, EditorCommand};
pub use errors::StoreError;
pub use history::{History, HistoryEntry, HISTORY_CAP};
pub use reorder::{apply_drop, flatten_visible, plan_drop, FlatRow, ReorderUpdate};
pub use selection::Selection;
pub use store::{BlockStore, BlockUpdate};
