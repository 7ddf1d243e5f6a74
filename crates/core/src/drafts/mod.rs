//! Draft persistence across a device-local and an optional remote location.
//!
//! Local writes always happen first so an unreachable remote never loses data.
//! Remote failures queue the draft id and are retried on the next save or an
//! explicit [`DraftStore::sync_pending`]. Discards the remote could not apply
//! are queued the same way and hide the remote copy until they succeed.

pub mod memory;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::draft::{DraftId, DraftSource, FormPayload, ServiceRequestDraft};

pub use memory::InMemoryDraftRepository;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("draft storage failed: {0}")]
    Storage(String),
    #[error("draft location unavailable: {0}")]
    Unavailable(String),
    #[error("draft `{id}` is corrupt: {reason}")]
    Corrupt { id: DraftId, reason: String },
    #[error("draft `{0}` not found")]
    NotFound(DraftId),
}

#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn find(&self, id: &DraftId) -> Result<Option<ServiceRequestDraft>, DraftError>;
    async fn list(&self) -> Result<Vec<ServiceRequestDraft>, DraftError>;
    async fn upsert(&self, draft: ServiceRequestDraft) -> Result<(), DraftError>;
    /// Returns whether a draft was removed.
    async fn delete(&self, id: &DraftId) -> Result<bool, DraftError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Created,
    Updated,
    Unchanged,
    /// A newer revision is already stored; nothing was written.
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub id: DraftId,
    pub outcome: SaveOutcome,
    /// Revision now stored for this id.
    pub revision: u64,
    pub remote_synced: bool,
}

pub struct DraftStore {
    local: Arc<dyn DraftRepository>,
    remote: Option<Arc<dyn DraftRepository>>,
    pending_sync: Mutex<BTreeSet<DraftId>>,
    pending_discard: Mutex<BTreeSet<DraftId>>,
}

impl DraftStore {
    pub fn local_only(local: Arc<dyn DraftRepository>) -> Self {
        Self::build(local, None)
    }

    pub fn with_remote(local: Arc<dyn DraftRepository>, remote: Arc<dyn DraftRepository>) -> Self {
        Self::build(local, Some(remote))
    }

    fn build(local: Arc<dyn DraftRepository>, remote: Option<Arc<dyn DraftRepository>>) -> Self {
        Self {
            local,
            remote,
            pending_sync: Mutex::new(BTreeSet::new()),
            pending_discard: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Ids whose latest local write has not reached the remote yet.
    pub fn pending_sync(&self) -> Vec<DraftId> {
        self.pending().iter().cloned().collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending().is_empty() || !self.discards().is_empty()
    }

    /// Ids discarded locally whose remote copy still has to be deleted.
    pub fn pending_discards(&self) -> Vec<DraftId> {
        self.discards().iter().cloned().collect()
    }

    /// Upserts by id. `draft.revision` is the revision the caller last saw;
    /// the stored revision is bumped only when the payload or step changed.
    pub async fn save(&self, draft: ServiceRequestDraft) -> Result<SaveReport, DraftError> {
        let existing = self.local.find(&draft.id).await?;
        self.discards().remove(&draft.id);

        let (outcome, revision, created_at) = match &existing {
            Some(stored) if draft.revision < stored.revision => {
                tracing::debug!(
                    event_name = "draft.save_stale",
                    draft_id = %draft.id,
                    stored_revision = stored.revision,
                    incoming_revision = draft.revision,
                    "dropping stale draft write"
                );
                return Ok(SaveReport {
                    id: draft.id,
                    outcome: SaveOutcome::Stale,
                    revision: stored.revision,
                    remote_synced: false,
                });
            }
            Some(stored)
                if stored.current_step == draft.current_step
                    && fingerprint(&stored.payload) == fingerprint(&draft.payload) =>
            {
                (SaveOutcome::Unchanged, stored.revision, stored.created_at)
            }
            Some(stored) => (SaveOutcome::Updated, stored.revision + 1, stored.created_at),
            None => (SaveOutcome::Created, draft.revision.max(1), draft.created_at),
        };

        let id = draft.id.clone();
        let record = ServiceRequestDraft { revision, created_at, ..draft };

        if outcome != SaveOutcome::Unchanged {
            self.local.upsert(record.clone().with_source(DraftSource::Local)).await?;
            tracing::info!(
                event_name = "draft.saved",
                draft_id = %id,
                revision,
                outcome = ?outcome,
                "draft saved locally"
            );
            self.pending().insert(id.clone());
        }

        let remote_synced = self.push_remote(&record).await;
        if remote_synced {
            self.sync_pending().await;
        }

        Ok(SaveReport { id, outcome, revision, remote_synced })
    }

    /// Reconciled copy for `id`. A draft that fails its integrity check is
    /// reported as corrupt rather than returned. When only one location holds
    /// a corrupt copy, the healthy copy from the other location is used.
    pub async fn load(&self, id: &DraftId) -> Result<Option<ServiceRequestDraft>, DraftError> {
        if self.discards().contains(id) {
            return Ok(None);
        }

        let mut corrupt = None;
        let local = match self.local.find(id).await {
            Ok(found) => found,
            Err(error @ DraftError::Corrupt { .. }) if self.remote.is_some() => {
                tracing::warn!(
                    event_name = "draft.local_corrupt",
                    draft_id = %id,
                    error = %error,
                    "local draft copy is corrupt, trying remote copy"
                );
                corrupt = Some(error);
                None
            }
            Err(error) => return Err(error),
        };

        let remote = match &self.remote {
            Some(remote) => match remote.find(id).await {
                Ok(found) => found,
                Err(error @ DraftError::Corrupt { .. }) => {
                    if local.is_none() {
                        return Err(error);
                    }
                    tracing::warn!(
                        event_name = "draft.remote_corrupt",
                        draft_id = %id,
                        error = %error,
                        "remote draft copy is corrupt, using local copy"
                    );
                    None
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "draft.remote_load_failed",
                        draft_id = %id,
                        error = %error,
                        "remote draft unavailable, using local copy"
                    );
                    None
                }
            },
            None => None,
        };

        let Some(draft) = reconcile(local, remote) else {
            return match corrupt {
                Some(error) => Err(error),
                None => Ok(None),
            };
        };

        if let Some(reason) = draft.integrity_problem() {
            tracing::warn!(
                event_name = "draft.corrupt",
                draft_id = %id,
                reason = %reason,
                "refusing to resume corrupt draft"
            );
            return Err(DraftError::Corrupt { id: id.clone(), reason });
        }

        Ok(Some(draft))
    }

    /// Both locations merged by id, most recently updated first.
    pub async fn list(&self) -> Result<Vec<ServiceRequestDraft>, DraftError> {
        let mut merged: BTreeMap<DraftId, ServiceRequestDraft> = BTreeMap::new();
        for draft in self.local.list().await? {
            merged.insert(draft.id.clone(), draft);
        }

        if let Some(remote) = &self.remote {
            match remote.list().await {
                Ok(drafts) => {
                    for draft in drafts {
                        let local = merged.remove(&draft.id);
                        if let Some(winner) = reconcile(local, Some(draft)) {
                            merged.insert(winner.id.clone(), winner);
                        }
                    }
                }
                Err(error) => tracing::warn!(
                    event_name = "draft.remote_list_failed",
                    error = %error,
                    "listing local drafts only"
                ),
            }
        }

        let discarded = self.discards();
        let mut drafts: Vec<_> =
            merged.into_values().filter(|draft| !discarded.contains(&draft.id)).collect();
        drop(discarded);
        drafts.sort_by(|left, right| {
            right.updated_at.cmp(&left.updated_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(drafts)
    }

    /// Removes the draft everywhere. Unknown ids are a no-op. A remote delete
    /// that fails is queued for [`DraftStore::sync_pending`] and the id stays
    /// hidden from `load` and `list` until it goes through.
    pub async fn discard(&self, id: &DraftId) -> Result<(), DraftError> {
        let removed_local = self.local.delete(id).await?;
        self.pending().remove(id);

        let removed_remote = match &self.remote {
            Some(remote) => match remote.delete(id).await {
                Ok(removed) => {
                    self.discards().remove(id);
                    removed
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "draft.remote_discard_failed",
                        draft_id = %id,
                        error = %error,
                        "remote draft delete failed, queued for retry"
                    );
                    self.discards().insert(id.clone());
                    false
                }
            },
            None => false,
        };

        tracing::info!(
            event_name = "draft.discarded",
            draft_id = %id,
            removed_local,
            removed_remote,
            "draft discarded"
        );
        Ok(())
    }

    /// Retries queued remote deletes, then queued remote writes. Stops at the
    /// first failure and returns how many queued operations completed.
    pub async fn sync_pending(&self) -> usize {
        let Some(remote) = &self.remote else {
            self.pending().clear();
            self.discards().clear();
            return 0;
        };

        let mut synced = 0;
        for id in self.pending_discards() {
            match remote.delete(&id).await {
                Ok(_) => {
                    self.discards().remove(&id);
                    synced += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "draft.remote_discard_failed",
                        draft_id = %id,
                        error = %error,
                        "queued remote delete still failing"
                    );
                    return synced;
                }
            }
        }

        for id in self.pending_sync() {
            let local = match self.local.find(&id).await {
                Ok(local) => local,
                Err(error) => {
                    tracing::warn!(
                        event_name = "draft.sync_read_failed",
                        draft_id = %id,
                        error = %error,
                        "could not read queued draft"
                    );
                    break;
                }
            };
            let Some(local) = local else {
                self.pending().remove(&id);
                continue;
            };
            if !self.push_remote(&local).await {
                break;
            }
            synced += 1;
        }
        synced
    }

    async fn push_remote(&self, draft: &ServiceRequestDraft) -> bool {
        let Some(remote) = &self.remote else {
            self.pending().remove(&draft.id);
            return false;
        };
        if !self.pending().contains(&draft.id) {
            return true;
        }

        match remote.upsert(draft.clone().with_source(DraftSource::Remote)).await {
            Ok(()) => {
                self.pending().remove(&draft.id);
                true
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "draft.remote_sync_failed",
                    draft_id = %draft.id,
                    error = %error,
                    "remote draft save failed, kept locally and queued for retry"
                );
                false
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, BTreeSet<DraftId>> {
        lock_ids(&self.pending_sync)
    }

    fn discards(&self) -> MutexGuard<'_, BTreeSet<DraftId>> {
        lock_ids(&self.pending_discard)
    }
}

fn lock_ids(ids: &Mutex<BTreeSet<DraftId>>) -> MutexGuard<'_, BTreeSet<DraftId>> {
    match ids.lock() {
        Ok(ids) => ids,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Last writer wins by `updated_at`, then `revision`; the remote copy wins ties.
pub fn reconcile(
    local: Option<ServiceRequestDraft>,
    remote: Option<ServiceRequestDraft>,
) -> Option<ServiceRequestDraft> {
    match (local, remote) {
        (Some(local), Some(remote)) => {
            let local_key = (local.updated_at, local.revision);
            let remote_key = (remote.updated_at, remote.revision);
            if local_key > remote_key {
                Some(local)
            } else {
                Some(remote)
            }
        }
        (local, remote) => remote.or(local),
    }
}

pub fn fingerprint(payload: &FormPayload) -> blake3::Hash {
    let canonical = serde_json::Value::Object(payload.clone()).to_string();
    blake3::hash(canonical.as_bytes())
}
