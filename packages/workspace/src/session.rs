//! # Editor Session
//!
//! One open document: the block store, its autosave task, and the revision
//! bookkeeping that ties local state to the persistence backend.
//!
//! The session is the synchronous surface the UI talks to. Mutations run
//! against the store immediately; each commit ships a snapshot to the
//! autosave task, and `pump_reports` folds save outcomes back into local
//! state. Only opening, version restore, and conflict resolution await the
//! backend directly.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use pagecraft_editor::{
    apply_command, apply_drop, Block, BlockStore, BlockType, BlockUpdate, CommandEffect,
    EditorCommand, ReorderUpdate, StoreError,
};

use crate::autosave::{spawn_autosave, AutosaveConfig, AutosaveEvent, AutosaveHandle, SaveReport};
use crate::persistence::{
    ConflictInfo, PersistenceBackend, PersistenceError, SaveOutcome, SaveRequest,
};

/// How to resolve a detected write conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Discard local edits and adopt the server's version
    ReloadRemote,
    /// Overwrite the server's version with the local tree
    ForceOverwrite,
    /// Serialize the local tree for manual reconciliation; the conflict
    /// stays active
    ExportLocal,
}

pub struct EditorSession {
    entity_id: String,
    store: BlockStore,
    backend: Arc<dyn PersistenceBackend>,
    autosave: AutosaveHandle,
    base_revision: u64,
    conflict: Option<ConflictInfo>,
}

impl EditorSession {
    /// Load the entity's document and start its autosave task
    pub async fn open(
        backend: Arc<dyn PersistenceBackend>,
        entity_id: &str,
        config: AutosaveConfig,
    ) -> Result<Self, PersistenceError> {
        let doc = backend.load(entity_id).await?;
        debug!(entity_id, revision = doc.revision, blocks = doc.blocks.len(), "opened session");

        let mut store = BlockStore::new(entity_id);
        store.replace_all(doc.blocks);

        let autosave = spawn_autosave(
            backend.clone(),
            entity_id.to_string(),
            doc.revision,
            config,
        );

        Ok(Self {
            entity_id: entity_id.to_string(),
            store,
            backend,
            autosave,
            base_revision: doc.revision,
            conflict: None,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn base_revision(&self) -> u64 {
        self.base_revision
    }

    pub fn conflict(&self) -> Option<&ConflictInfo> {
        self.conflict.as_ref()
    }

    // --- Mutations (delegate to the store, then notify autosave) ---

    /// Run a mutation against the store and ship a snapshot to autosave.
    ///
    /// Only a committed mutation (the change sequence advanced) notifies the
    /// controller; a no-op must not re-arm the debounce.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut BlockStore) -> R) -> R {
        let seq_before = self.store.change_seq();
        let result = f(&mut self.store);
        if self.store.change_seq() != seq_before {
            self.notify_change();
        }
        result
    }

    pub fn add_block(
        &mut self,
        block_type: BlockType,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> Option<Block> {
        self.edit(|store| store.add(block_type, parent_id, index))
    }

    pub fn update_block(&mut self, id: &str, changes: BlockUpdate) -> bool {
        self.edit(|store| store.update(id, changes))
    }

    pub fn delete_block(&mut self, id: &str) -> bool {
        self.edit(|store| store.delete(id))
    }

    pub fn reorder_blocks(&mut self, updates: &[ReorderUpdate]) -> Result<(), StoreError> {
        self.edit(|store| store.reorder(updates))
    }

    pub fn drop_block(
        &mut self,
        source_id: &str,
        target_id: &str,
        expanded: &HashSet<String>,
    ) -> Result<bool, StoreError> {
        self.edit(|store| apply_drop(store, source_id, target_id, expanded))
    }

    pub fn undo(&mut self) -> bool {
        self.edit(|store| store.undo())
    }

    pub fn redo(&mut self) -> bool {
        self.edit(|store| store.redo())
    }

    pub fn select(&mut self, id: Option<String>) {
        // Observational; no snapshot shipped
        self.store.select(id);
    }

    pub fn hover(&mut self, id: Option<String>) {
        self.store.hover(id);
    }

    /// Dispatch a keyboard command; `SaveNow` becomes a manual save
    pub fn handle_command(&mut self, command: EditorCommand) -> CommandEffect {
        let effect = self.edit(|store| apply_command(store, command));
        if effect == CommandEffect::RequestSave {
            self.save_now();
        }
        effect
    }

    // --- Saving ---

    /// Manual save: bypasses the debounce, same reconciliation path
    pub fn save_now(&self) {
        if !self.store.dirty() {
            return;
        }
        let event = AutosaveEvent::SaveNow {
            seq: self.store.change_seq(),
            blocks: self.store.snapshot(),
        };
        if self.autosave.events.try_send(event).is_err() {
            warn!(entity_id = %self.entity_id, "autosave channel full, manual save dropped");
        }
    }

    /// Fold completed save outcomes back into local state
    pub fn pump_reports(&mut self) {
        while let Ok(report) = self.autosave.reports.try_recv() {
            match report {
                SaveReport::Saved { seq, document } => {
                    self.base_revision = document.revision;
                    if self.store.mark_saved(seq, document.blocks) {
                        debug!(
                            entity_id = %self.entity_id,
                            revision = document.revision,
                            "baseline advanced"
                        );
                    }
                }
                SaveReport::Conflict(info) => {
                    warn!(
                        entity_id = %self.entity_id,
                        server_revision = info.server_revision,
                        "conflict pending resolution"
                    );
                    self.conflict = Some(info);
                }
                SaveReport::Failed { message } => {
                    // Dirty flag stays set; the next change retries
                    warn!(entity_id = %self.entity_id, message = %message, "save failed");
                }
            }
        }
    }

    /// Resolve a pending conflict.
    ///
    /// `ExportLocal` returns the local tree as JSON and leaves the conflict
    /// active; the other two resolutions resume autosave.
    pub async fn resolve_conflict(
        &mut self,
        resolution: ConflictResolution,
    ) -> Result<Option<String>, PersistenceError> {
        let Some(conflict) = self.conflict.clone() else {
            return Ok(None);
        };

        match resolution {
            ConflictResolution::ReloadRemote => {
                let doc = self.backend.load(&self.entity_id).await?;
                self.store.replace_all(doc.blocks);
                self.base_revision = doc.revision;
                self.conflict = None;
                self.resume_autosave();
                Ok(None)
            }
            ConflictResolution::ForceOverwrite => {
                let request = SaveRequest {
                    entity_id: self.entity_id.clone(),
                    base_revision: conflict.server_revision,
                    blocks: self.store.snapshot(),
                };
                let seq = self.store.change_seq();
                match self.backend.save(request).await? {
                    SaveOutcome::Saved(doc) => {
                        self.base_revision = doc.revision;
                        self.store.mark_saved(seq, doc.blocks);
                        self.conflict = None;
                        self.resume_autosave();
                        Ok(None)
                    }
                    SaveOutcome::Conflict(info) => {
                        // The server moved again underneath us; stay suspended
                        self.conflict = Some(info);
                        Ok(None)
                    }
                }
            }
            ConflictResolution::ExportLocal => {
                let json = serde_json::to_string_pretty(self.store.blocks())?;
                Ok(Some(json))
            }
        }
    }

    /// Replace the live tree with a stored version snapshot.
    ///
    /// The backend persists the restore as a new revision, so the client
    /// side is exactly a load.
    pub async fn restore_version(&mut self, version_id: &str) -> Result<(), PersistenceError> {
        let doc = self
            .backend
            .restore_version(&self.entity_id, version_id)
            .await?;
        self.store.replace_all(doc.blocks);
        self.base_revision = doc.revision;
        self.conflict = None;
        self.resume_autosave();
        Ok(())
    }

    fn notify_change(&self) {
        if !self.store.dirty() {
            return;
        }
        let event = AutosaveEvent::Changed {
            seq: self.store.change_seq(),
            blocks: self.store.snapshot(),
        };
        if self.autosave.events.try_send(event).is_err() {
            warn!(entity_id = %self.entity_id, "autosave channel full, change dropped");
        }
    }

    fn resume_autosave(&self) {
        let _ = self.autosave.events.try_send(AutosaveEvent::Resume {
            base_revision: self.base_revision,
        });
    }
}
