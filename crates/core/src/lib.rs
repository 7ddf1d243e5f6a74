pub mod audit;
pub mod config;
pub mod domain;
pub mod drafts;
pub mod errors;
pub mod form;
pub mod journey;
pub mod pricing;
pub mod validation;

pub use domain::draft::{DraftId, DraftSource, FormPayload, ServiceRequestDraft};
pub use domain::pricing_factor::{FactorCategory, PricingFactor, PricingFactorId};
pub use domain::request::{RequestType, ServiceRequest};
pub use drafts::{DraftError, DraftRepository, DraftStore, SaveOutcome, SaveReport};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use form::{
    FormController, FormDefinition, NavigationError, SubmissionGateway, SubmitError,
};
pub use journey::{JourneyError, JourneyStop, JourneyStopList, StopType};
pub use pricing::{
    compute_quote, decode_factors, DeterministicPricingEngine, PriceQuote, PricingContext,
    PricingEngine, PricingFactorSource, RequestAttributes,
};
pub use validation::{assemble_request, FieldError, ValidationErrors};
