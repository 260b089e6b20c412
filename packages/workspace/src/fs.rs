//! # JSON-file persistence backend
//!
//! One JSON record per entity scope under a root directory, named by the
//! CRC32 scope seed so arbitrary entity ids stay filesystem-safe. The
//! record embeds the canonical document and its version snapshots.
//!
//! Read-modify-write cycles are serialized through a single lock; this
//! backend assumes one process owns the directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use pagecraft_common::get_scope_seed;

use crate::persistence::{
    reconcile, EntityDocument, PersistenceBackend, PersistenceError, SaveOutcome, SaveRequest,
    VersionInfo, VersionRecord,
};

#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    doc: EntityDocument,
    versions: Vec<VersionRecord>,
}

pub struct JsonFileBackend {
    root: PathBuf,
    io_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            io_lock: Mutex::new(()),
        }
    }

    fn entity_path(&self, entity_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", get_scope_seed(entity_id)))
    }

    async fn read_record(
        &self,
        path: &Path,
        entity_id: &str,
    ) -> Result<FileRecord, PersistenceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileRecord {
                doc: EntityDocument::empty(entity_id),
                versions: Vec::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, path: &Path, record: &FileRecord) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(path, bytes).await?;
        debug!(path = %path.display(), "wrote entity record");
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for JsonFileBackend {
    async fn load(&self, entity_id: &str) -> Result<EntityDocument, PersistenceError> {
        let _guard = self.io_lock.lock().await;
        let record = self
            .read_record(&self.entity_path(entity_id), entity_id)
            .await?;
        Ok(record.doc)
    }

    async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, PersistenceError> {
        let _guard = self.io_lock.lock().await;
        let path = self.entity_path(&request.entity_id);
        let mut record = self.read_record(&path, &request.entity_id).await?;

        let outcome = reconcile(&mut record.doc, &mut record.versions, request);
        if matches!(outcome, SaveOutcome::Saved(_)) {
            self.write_record(&path, &record).await?;
        }
        Ok(outcome)
    }

    async fn list_versions(&self, entity_id: &str) -> Result<Vec<VersionInfo>, PersistenceError> {
        let _guard = self.io_lock.lock().await;
        let record = self
            .read_record(&self.entity_path(entity_id), entity_id)
            .await?;
        Ok(record.versions.iter().map(|v| v.info.clone()).collect())
    }

    async fn restore_version(
        &self,
        entity_id: &str,
        version_id: &str,
    ) -> Result<EntityDocument, PersistenceError> {
        let _guard = self.io_lock.lock().await;
        let path = self.entity_path(entity_id);
        let mut record = self.read_record(&path, entity_id).await?;
        if record.doc.revision == 0 && record.versions.is_empty() {
            return Err(PersistenceError::UnknownEntity(entity_id.to_string()));
        }

        let blocks = record
            .versions
            .iter()
            .find(|v| v.info.version_id == version_id)
            .map(|v| v.blocks.clone())
            .ok_or_else(|| PersistenceError::UnknownVersion(version_id.to_string()))?;

        let request = SaveRequest {
            entity_id: entity_id.to_string(),
            base_revision: record.doc.revision,
            blocks,
        };
        match reconcile(&mut record.doc, &mut record.versions, request) {
            SaveOutcome::Saved(doc) => {
                self.write_record(&path, &record).await?;
                Ok(doc)
            }
            SaveOutcome::Conflict(_) => {
                Err(PersistenceError::UnknownVersion(version_id.to_string()))
            }
        }
    }
}
