//! # Snapshot History
//!
//! Tracks edit history as full snapshots of the block collection and enables
//! undo/redo over them.
//!
//! ## Design
//!
//! - Every committing mutation pushes a deep snapshot of the whole collection
//! - The cursor points at the entry matching the live tree
//! - Pushing after an undo truncates the redo branch (linear history)
//! - A bounded cap evicts the oldest entry and shifts the cursor
//!
//! Snapshots are deep clones rather than structurally shared: documents are
//! small and the contract is full-state equality at every history point.

use crate::block::Block;
use chrono::{DateTime, Utc};

/// Maximum number of history entries retained
pub const HISTORY_CAP: usize = 50;

/// One point in edit history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub blocks: Vec<Block>,
    pub timestamp: DateTime<Utc>,
}

/// Bounded linear undo/redo history
#[derive(Debug)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
    cap: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_cap(HISTORY_CAP)
    }

    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// Record a snapshot of the current block collection.
    ///
    /// Entries beyond the cursor (the redo branch) are discarded first, so
    /// redoing past a new edit is impossible.
    pub fn push(&mut self, blocks: &[Block]) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }

        self.entries.push(HistoryEntry {
            blocks: blocks.to_vec(),
            timestamp: Utc::now(),
        });
        self.cursor = self.entries.len() - 1;

        if self.entries.len() > self.cap {
            self.entries.remove(0);
            self.cursor -= 1;
        }
    }

    /// Step back; returns the snapshot to restore, or `None` at the start
    pub fn undo(&mut self) -> Option<Vec<Block>> {
        if self.cursor == 0 || self.entries.is_empty() {
            return None;
        }
        self.cursor -= 1;
        Some(self.entries[self.cursor].blocks.clone())
    }

    /// Step forward; returns the snapshot to restore, or `None` at the end
    pub fn redo(&mut self) -> Option<Vec<Block>> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor].blocks.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0 && !self.entries.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
