use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::domain::draft::{DraftId, ServiceRequestDraft};

use super::{DraftError, DraftRepository};

/// Process-local drafts. Availability can be toggled to stand in for a
/// location that is temporarily unreachable.
pub struct InMemoryDraftRepository {
    label: &'static str,
    drafts: RwLock<HashMap<DraftId, ServiceRequestDraft>>,
    available: AtomicBool,
}

impl Default for InMemoryDraftRepository {
    fn default() -> Self {
        Self::named("memory")
    }
}

impl InMemoryDraftRepository {
    pub fn named(label: &'static str) -> Self {
        Self { label, drafts: RwLock::new(HashMap::new()), available: AtomicBool::new(true) }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }

    fn ensure_available(&self) -> Result<(), DraftError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DraftError::Unavailable(format!("{} draft store is offline", self.label)))
        }
    }
}

#[async_trait::async_trait]
impl DraftRepository for InMemoryDraftRepository {
    async fn find(&self, id: &DraftId) -> Result<Option<ServiceRequestDraft>, DraftError> {
        self.ensure_available()?;
        let drafts = self.drafts.read().await;
        Ok(drafts.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<ServiceRequestDraft>, DraftError> {
        self.ensure_available()?;
        let drafts = self.drafts.read().await;
        Ok(drafts.values().cloned().collect())
    }

    async fn upsert(&self, draft: ServiceRequestDraft) -> Result<(), DraftError> {
        self.ensure_available()?;
        let mut drafts = self.drafts.write().await;
        drafts.insert(draft.id.clone(), draft);
        Ok(())
    }

    async fn delete(&self, id: &DraftId) -> Result<bool, DraftError> {
        self.ensure_available()?;
        let mut drafts = self.drafts.write().await;
        Ok(drafts.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Map;

    use super::InMemoryDraftRepository;
    use crate::domain::draft::{DraftId, ServiceRequestDraft};
    use crate::drafts::{DraftError, DraftRepository};

    #[tokio::test]
    async fn offline_repository_rejects_every_operation() {
        let repo = InMemoryDraftRepository::named("remote");
        let id = DraftId("DRAFT-offline".to_owned());
        repo.upsert(ServiceRequestDraft::new(id.clone(), Map::new(), Utc::now()))
            .await
            .expect("online upsert");

        repo.set_available(false);
        assert!(matches!(repo.find(&id).await, Err(DraftError::Unavailable(_))));
        assert!(matches!(repo.delete(&id).await, Err(DraftError::Unavailable(_))));

        repo.set_available(true);
        assert!(repo.delete(&id).await.expect("delete"));
        assert!(!repo.delete(&id).await.expect("second delete"));
    }
}
