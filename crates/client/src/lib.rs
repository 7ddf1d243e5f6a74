//! JSON-over-HTTP collaborators for the movely backend.

pub mod api;
pub mod drafts;
pub mod pricing;
pub mod submission;

pub use api::{ApiClient, ClientError};
pub use drafts::RemoteDraftRepository;
pub use pricing::HttpPricingFactorSource;
pub use submission::HttpSubmissionGateway;
