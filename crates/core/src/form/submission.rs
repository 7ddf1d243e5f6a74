use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::draft::DraftId;
use crate::domain::request::ServiceRequest;
use crate::pricing::PriceQuote;
use crate::validation::{FieldError, ValidationErrors};

/// Body of `POST /requests`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<DraftId>,
    pub request: ServiceRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<PriceQuote>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("acknowledgement could not be decoded: {0}")]
    Decode(String),
}

impl SubmissionError {
    /// Transport failures and server-side errors can be retried as is.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
            Self::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError>;
}

#[async_trait]
impl<T> SubmissionGateway for Arc<T>
where
    T: SubmissionGateway + ?Sized,
{
    async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionReceipt, SubmissionError> {
        (**self).submit(payload).await
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("request could not be assembled: {0}")]
    Assemble(FieldError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl SubmitError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Submission(error) if error.is_retryable())
    }
}
