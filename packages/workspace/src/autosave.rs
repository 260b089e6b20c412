//! # Autosave Controller
//!
//! A background task that turns a stream of change notifications into
//! debounced full-state saves.
//!
//! ## Behavior
//!
//! - Each change (re)arms a quiet-period deadline; the latest snapshot wins
//! - The task starts with no deadline, so opening a document never saves
//! - Manual saves bypass the debounce but share the reconciliation path
//! - A conflict suspends all saving for the scope until the session resumes
//!   it with a resolved base revision
//! - A failed or timed-out save keeps the snapshot pending and re-arms the
//!   deadline, so the save retries with the latest tree state
//!
//! The session owns the dirty flag; this task only reports outcomes. The
//! change sequence stamped on each snapshot lets the session decide whether
//! a completed save still reflects the live tree.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, warn};

use pagecraft_editor::Block;

use crate::persistence::{ConflictInfo, EntityDocument, PersistenceBackend, SaveOutcome, SaveRequest};

#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// Quiet period after the last change before a save fires
    pub quiet_period: Duration,
    /// Upper bound on one save round-trip
    pub save_timeout: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(2),
            save_timeout: Duration::from_secs(10),
        }
    }
}

/// Events from the session to the controller
#[derive(Debug)]
pub enum AutosaveEvent {
    /// The tree changed; arm/re-arm the debounce with this snapshot
    Changed { seq: u64, blocks: Vec<Block> },
    /// Save immediately, bypassing the debounce
    SaveNow { seq: u64, blocks: Vec<Block> },
    /// Conflict resolved; resume saving from this base revision
    Resume { base_revision: u64 },
}

/// Outcomes reported back to the session
#[derive(Debug)]
pub enum SaveReport {
    Saved { seq: u64, document: EntityDocument },
    Conflict(ConflictInfo),
    Failed { message: String },
}

/// Channel pair connecting a session to its autosave task
pub struct AutosaveHandle {
    pub events: mpsc::Sender<AutosaveEvent>,
    pub reports: mpsc::Receiver<SaveReport>,
}

/// Spawn the autosave task for one entity scope
pub fn spawn_autosave(
    backend: Arc<dyn PersistenceBackend>,
    entity_id: String,
    base_revision: u64,
    config: AutosaveConfig,
) -> AutosaveHandle {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (report_tx, report_rx) = mpsc::channel(64);

    let worker = AutosaveWorker {
        backend,
        entity_id,
        config,
        base_revision,
        suspended: false,
        reports: report_tx,
    };
    tokio::spawn(worker.run(event_rx));

    AutosaveHandle {
        events: event_tx,
        reports: report_rx,
    }
}

struct AutosaveWorker {
    backend: Arc<dyn PersistenceBackend>,
    entity_id: String,
    config: AutosaveConfig,
    base_revision: u64,
    suspended: bool,
    reports: mpsc::Sender<SaveReport>,
}

impl AutosaveWorker {
    async fn run(mut self, mut events: mpsc::Receiver<AutosaveEvent>) {
        let mut pending: Option<(u64, Vec<Block>)> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            let event = match deadline {
                Some(at) => match timeout_at(at, events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        deadline = None;
                        if let Some((seq, blocks)) = pending.take() {
                            pending = self.flush(seq, blocks).await;
                            if pending.is_some() && !self.suspended {
                                deadline = Some(Instant::now() + self.config.quiet_period);
                            }
                        }
                        continue;
                    }
                },
                None => events.recv().await,
            };
            let Some(event) = event else {
                // Session dropped its handle; stop
                break;
            };

            match event {
                AutosaveEvent::Changed { seq, blocks } => {
                    if self.suspended {
                        // The session's dirty flag keeps these edits alive;
                        // resolution decides what gets saved next
                        debug!(entity_id = %self.entity_id, "change while suspended, dropped");
                        continue;
                    }
                    pending = Some((seq, blocks));
                    deadline = Some(Instant::now() + self.config.quiet_period);
                }
                AutosaveEvent::SaveNow { seq, blocks } => {
                    if self.suspended {
                        warn!(entity_id = %self.entity_id, "manual save ignored: conflict unresolved");
                        continue;
                    }
                    deadline = None;
                    pending = self.flush(seq, blocks).await;
                    if pending.is_some() && !self.suspended {
                        deadline = Some(Instant::now() + self.config.quiet_period);
                    }
                }
                AutosaveEvent::Resume { base_revision } => {
                    self.base_revision = base_revision;
                    self.suspended = false;
                    pending = None;
                    deadline = None;
                }
            }
        }
    }

    /// Attempt one save; returns the snapshot back when it should be retried
    async fn flush(&mut self, seq: u64, blocks: Vec<Block>) -> Option<(u64, Vec<Block>)> {
        let request = SaveRequest {
            entity_id: self.entity_id.clone(),
            base_revision: self.base_revision,
            blocks: blocks.clone(),
        };

        match timeout(self.config.save_timeout, self.backend.save(request)).await {
            Ok(Ok(SaveOutcome::Saved(document))) => {
                debug!(
                    entity_id = %self.entity_id,
                    revision = document.revision,
                    "autosave completed"
                );
                self.base_revision = document.revision;
                let _ = self.reports.send(SaveReport::Saved { seq, document }).await;
                None
            }
            Ok(Ok(SaveOutcome::Conflict(info))) => {
                warn!(
                    entity_id = %self.entity_id,
                    server_revision = info.server_revision,
                    "autosave hit a conflict, suspending"
                );
                self.suspended = true;
                let _ = self.reports.send(SaveReport::Conflict(info)).await;
                // The session holds the live tree; resolution decides what
                // gets saved next
                None
            }
            Ok(Err(e)) => {
                error!(entity_id = %self.entity_id, error = %e, "autosave failed");
                let _ = self
                    .reports
                    .send(SaveReport::Failed {
                        message: e.to_string(),
                    })
                    .await;
                Some((seq, blocks))
            }
            Err(_) => {
                error!(entity_id = %self.entity_id, "autosave timed out");
                let _ = self
                    .reports
                    .send(SaveReport::Failed {
                        message: "save timed out".to_string(),
                    })
                    .await;
                Some((seq, blocks))
            }
        }
    }
}
