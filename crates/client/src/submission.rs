use movely_core::form::{SubmissionError, SubmissionGateway, SubmissionPayload, SubmissionReceipt};

use crate::api::{ApiClient, ClientError};

/// Sends assembled requests to `POST /requests`.
#[derive(Clone, Debug)]
pub struct HttpSubmissionGateway {
    client: ApiClient,
}

impl HttpSubmissionGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl From<ClientError> for SubmissionError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Status { status, body } => Self::Rejected { status, message: body },
            ClientError::Decode(reason) => Self::Decode(reason),
            other => Self::Network(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl SubmissionGateway for HttpSubmissionGateway {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError> {
        let receipt: SubmissionReceipt = self.client.post_json(&["requests"], payload).await?;
        tracing::info!(
            event_name = "client.request_submitted",
            request_id = %receipt.id,
            "service request acknowledged"
        );
        Ok(receipt)
    }
}
