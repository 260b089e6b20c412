//! # Persistence Contract
//!
//! The save path is a full-state reconciliation, not a mutation replay: the
//! client sends its complete block list for one entity scope, the backend
//! diffs it against the stored list, bumps a single per-entity revision
//! counter, and returns the canonical document. A request whose base
//! revision is behind the stored one is a conflict; the backend never
//! merges concurrent edits.
//!
//! Every successful save also records a version snapshot, which powers the
//! restore path: restoring persists the old snapshot as a *new* revision, so
//! the client treats it exactly like a load.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pagecraft_editor::Block;

/// Canonical persisted state of one entity scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub entity_id: String,
    /// Monotonically increasing; bumped on every successful save
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub blocks: Vec<Block>,
}

impl EntityDocument {
    /// Fresh, never-saved document for an entity scope
    pub fn empty(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            revision: 0,
            updated_at: Utc::now(),
            blocks: Vec::new(),
        }
    }
}

/// Full-state save request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    pub entity_id: String,
    /// Revision the client's tree is based on
    pub base_revision: u64,
    pub blocks: Vec<Block>,
}

/// Detected mismatch between the client's assumed revision and the stored one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub server_revision: u64,
    pub client_revision: u64,
    pub server_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(EntityDocument),
    Conflict(ConflictInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version_id: String,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Server-side delta between the stored block list and an incoming one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDelta {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

/// Diff two full block lists by id
pub fn compute_delta(stored: &[Block], incoming: &[Block]) -> BlockDelta {
    let stored_by_id: HashMap<&str, &Block> =
        stored.iter().map(|b| (b.id.as_str(), b)).collect();
    let incoming_ids: HashMap<&str, ()> =
        incoming.iter().map(|b| (b.id.as_str(), ())).collect();

    let mut delta = BlockDelta::default();
    for block in incoming {
        match stored_by_id.get(block.id.as_str()) {
            None => delta.inserted.push(block.id.clone()),
            Some(existing) if *existing != block => delta.updated.push(block.id.clone()),
            Some(_) => {}
        }
    }
    for block in stored {
        if !incoming_ids.contains_key(block.id.as_str()) {
            delta.deleted.push(block.id.clone());
        }
    }
    delta
}

/// Persistence collaborator for entity-scoped block trees
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Load the canonical document; unknown entities yield a fresh empty one
    async fn load(&self, entity_id: &str) -> Result<EntityDocument, PersistenceError>;

    /// Reconcile a full-state save against the stored revision
    async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, PersistenceError>;

    /// Version snapshots recorded by past saves, newest last
    async fn list_versions(&self, entity_id: &str) -> Result<Vec<VersionInfo>, PersistenceError>;

    /// Persist an old snapshot as a new revision and return the result
    async fn restore_version(
        &self,
        entity_id: &str,
        version_id: &str,
    ) -> Result<EntityDocument, PersistenceError>;
}

/// One recorded version snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct VersionRecord {
    pub info: VersionInfo,
    pub blocks: Vec<Block>,
}

/// Shared reconciliation step used by every backend.
///
/// Mutates `doc`/`versions` in place on success; leaves them untouched and
/// returns the conflict otherwise.
pub(crate) fn reconcile(
    doc: &mut EntityDocument,
    versions: &mut Vec<VersionRecord>,
    request: SaveRequest,
) -> SaveOutcome {
    if request.base_revision != doc.revision {
        warn!(
            entity_id = %request.entity_id,
            server_revision = doc.revision,
            client_revision = request.base_revision,
            "save rejected: stored revision is newer"
        );
        return SaveOutcome::Conflict(ConflictInfo {
            server_revision: doc.revision,
            client_revision: request.base_revision,
            server_updated_at: doc.updated_at,
        });
    }

    let delta = compute_delta(&doc.blocks, &request.blocks);
    debug!(
        entity_id = %request.entity_id,
        inserted = delta.inserted.len(),
        updated = delta.updated.len(),
        deleted = delta.deleted.len(),
        "reconciled save"
    );

    doc.revision += 1;
    doc.updated_at = Utc::now();
    doc.blocks = request.blocks;

    versions.push(VersionRecord {
        info: VersionInfo {
            version_id: format!("v{}", doc.revision),
            revision: doc.revision,
            created_at: doc.updated_at,
        },
        blocks: doc.blocks.clone(),
    });

    SaveOutcome::Saved(doc.clone())
}

struct StoredEntity {
    doc: EntityDocument,
    versions: Vec<VersionRecord>,
}

/// In-memory backend; reference semantics for the save contract and the
/// default collaborator in tests
#[derive(Default)]
pub struct MemoryBackend {
    entities: Mutex<HashMap<String, StoredEntity>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn load(&self, entity_id: &str) -> Result<EntityDocument, PersistenceError> {
        let entities = self.entities.lock().await;
        Ok(entities
            .get(entity_id)
            .map(|e| e.doc.clone())
            .unwrap_or_else(|| EntityDocument::empty(entity_id)))
    }

    async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, PersistenceError> {
        let mut entities = self.entities.lock().await;
        let entry = entities
            .entry(request.entity_id.clone())
            .or_insert_with(|| StoredEntity {
                doc: EntityDocument::empty(&request.entity_id),
                versions: Vec::new(),
            });
        Ok(reconcile(&mut entry.doc, &mut entry.versions, request))
    }

    async fn list_versions(&self, entity_id: &str) -> Result<Vec<VersionInfo>, PersistenceError> {
        let entities = self.entities.lock().await;
        Ok(entities
            .get(entity_id)
            .map(|e| e.versions.iter().map(|v| v.info.clone()).collect())
            .unwrap_or_default())
    }

    async fn restore_version(
        &self,
        entity_id: &str,
        version_id: &str,
    ) -> Result<EntityDocument, PersistenceError> {
        let mut entities = self.entities.lock().await;
        let entry = entities
            .get_mut(entity_id)
            .ok_or_else(|| PersistenceError::UnknownEntity(entity_id.to_string()))?;

        let blocks = entry
            .versions
            .iter()
            .find(|v| v.info.version_id == version_id)
            .map(|v| v.blocks.clone())
            .ok_or_else(|| PersistenceError::UnknownVersion(version_id.to_string()))?;

        let request = SaveRequest {
            entity_id: entity_id.to_string(),
            base_revision: entry.doc.revision,
            blocks,
        };
        match reconcile(&mut entry.doc, &mut entry.versions, request) {
            SaveOutcome::Saved(doc) => Ok(doc),
            // base_revision was read under the same lock, so this is unreachable
            SaveOutcome::Conflict(_) => Err(PersistenceError::UnknownVersion(
                version_id.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_editor::BlockType;

    fn blocks(n: usize) -> Vec<Block> {
        (0..n)
            .map(|i| Block::new(format!("b-{}", i), BlockType::Text, None, i as i64))
            .collect()
    }

    #[test]
    fn test_compute_delta_classifies_changes() {
        let stored = blocks(3);
        let mut incoming = blocks(2);
        incoming[1].order = 9;
        incoming.push(Block::new("b-new".to_string(), BlockType::Text, None, 3));

        let delta = compute_delta(&stored, &incoming);
        assert_eq!(delta.inserted, vec!["b-new"]);
        assert_eq!(delta.updated, vec!["b-1"]);
        assert_eq!(delta.deleted, vec!["b-2"]);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let backend = MemoryBackend::new();

        let outcome = backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 0,
                blocks: blocks(3),
            })
            .await
            .unwrap();

        let SaveOutcome::Saved(saved) = outcome else {
            panic!("expected save to succeed");
        };
        assert_eq!(saved.revision, 1);

        let loaded = backend.load("course-1").await.unwrap();
        assert_eq!(loaded.blocks, blocks(3));
        assert_eq!(loaded.revision, 1);
    }

    #[tokio::test]
    async fn test_unknown_entity_loads_empty() {
        let backend = MemoryBackend::new();
        let doc = backend.load("nowhere").await.unwrap();
        assert_eq!(doc.revision, 0);
        assert!(doc.blocks.is_empty());
    }

    #[tokio::test]
    async fn test_stale_base_revision_conflicts() {
        let backend = MemoryBackend::new();

        // Client A saves 0 -> 1
        backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 0,
                blocks: blocks(1),
            })
            .await
            .unwrap();

        // Client B, still at base 0, must not silently overwrite revision 1
        let outcome = backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 0,
                blocks: blocks(2),
            })
            .await
            .unwrap();

        let SaveOutcome::Conflict(info) = outcome else {
            panic!("expected conflict");
        };
        assert_eq!(info.server_revision, 1);
        assert_eq!(info.client_revision, 0);

        // Stored state is still client A's
        let loaded = backend.load("course-1").await.unwrap();
        assert_eq!(loaded.blocks, blocks(1));
    }

    #[tokio::test]
    async fn test_versions_recorded_and_restorable() {
        let backend = MemoryBackend::new();

        backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 0,
                blocks: blocks(1),
            })
            .await
            .unwrap();
        backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 1,
                blocks: blocks(4),
            })
            .await
            .unwrap();

        let versions = backend.list_versions("course-1").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version_id, "v1");

        // Restore persists the old snapshot as a new revision
        let restored = backend.restore_version("course-1", "v1").await.unwrap();
        assert_eq!(restored.blocks, blocks(1));
        assert_eq!(restored.revision, 3);

        let loaded = backend.load("course-1").await.unwrap();
        assert_eq!(loaded.blocks, blocks(1));
    }

    #[tokio::test]
    async fn test_restore_unknown_version_errors() {
        let backend = MemoryBackend::new();
        backend
            .save(SaveRequest {
                entity_id: "course-1".to_string(),
                base_revision: 0,
                blocks: blocks(1),
            })
            .await
            .unwrap();

        let err = backend.restore_version("course-1", "v99").await;
        assert!(matches!(err, Err(PersistenceError::UnknownVersion(_))));
    }
}
