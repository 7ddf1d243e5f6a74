use movely_core::domain::draft::{DraftId, DraftSource, ServiceRequestDraft};
use movely_core::drafts::{DraftError, DraftRepository};

use crate::api::{ApiClient, ClientError};

const DRAFTS: &str = "drafts";

/// Drafts mirrored to the backend under `/drafts`.
#[derive(Clone, Debug)]
pub struct RemoteDraftRepository {
    client: ApiClient,
}

impl RemoteDraftRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl From<ClientError> for DraftError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Network(_) => Self::Unavailable(value.to_string()),
            ClientError::Status { status, .. } if status >= 500 || status == 429 => {
                Self::Unavailable(value.to_string())
            }
            other => Self::Storage(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl DraftRepository for RemoteDraftRepository {
    async fn find(&self, id: &DraftId) -> Result<Option<ServiceRequestDraft>, DraftError> {
        let found = self.client.get_optional_json::<ServiceRequestDraft>(&[DRAFTS, id.as_str()]).await;
        match found {
            Ok(draft) => Ok(draft.map(|draft| draft.with_source(DraftSource::Remote))),
            Err(ClientError::Decode(reason)) => Err(DraftError::Corrupt { id: id.clone(), reason }),
            Err(error) => Err(error.into()),
        }
    }

    async fn list(&self) -> Result<Vec<ServiceRequestDraft>, DraftError> {
        let drafts: Vec<ServiceRequestDraft> = self.client.get_json(&[DRAFTS], &[]).await?;
        Ok(drafts.into_iter().map(|draft| draft.with_source(DraftSource::Remote)).collect())
    }

    async fn upsert(&self, draft: ServiceRequestDraft) -> Result<(), DraftError> {
        self.client.post_unit(&[DRAFTS], &draft).await?;
        tracing::debug!(
            event_name = "client.draft_pushed",
            draft_id = %draft.id,
            revision = draft.revision,
            "draft pushed to remote"
        );
        Ok(())
    }

    async fn delete(&self, id: &DraftId) -> Result<bool, DraftError> {
        Ok(self.client.delete(&[DRAFTS, id.as_str()]).await?)
    }
}
