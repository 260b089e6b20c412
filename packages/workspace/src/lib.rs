//! # Pagecraft Workspace
//!
//! Persistence and session layer around the block-tree editing engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ editor: BlockStore (synchronous mutations)  │
//! └─────────────────────────────────────────────┘
//!          ↓ snapshots            ↑ canonical blocks
//! ┌─────────────────────────────────────────────┐
//! │ workspace: EditorSession                    │
//! │  - debounced autosave task                  │
//! │  - full-state reconciliation                │
//! │  - conflict detection + resolution          │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ PersistenceBackend (memory / JSON files)    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Saves are full-state: the session ships the complete block list for its
//! entity scope and the backend computes the insert/update/delete delta
//! against what it has stored. A save whose base revision is behind the
//! stored revision is a conflict; the backend never merges.

mod autosave;
mod fs;
mod persistence;
mod session;

pub use autosave::{
    spawn_autosave, AutosaveConfig, AutosaveEvent, AutosaveHandle, SaveReport,
};
pub use fs::JsonFileBackend;
pub use persistence::{
    compute_delta, BlockDelta, ConflictInfo, EntityDocument, MemoryBackend, PersistenceBackend,
    PersistenceError, SaveOutcome, SaveRequest, VersionInfo,
};
pub use session::{ConflictResolution, EditorSession};
