//! Multi-step service request form.

pub mod autosave;
pub mod controller;
pub mod definition;
pub mod submission;

pub use autosave::AutosaveDebounce;
pub use controller::{EditError, FormController, NavigationError, StepOutcome};
pub use definition::{FormDefinition, FormDefinitionError, FormStep};
pub use submission::{
    SubmissionError, SubmissionGateway, SubmissionPayload, SubmissionReceipt, SubmitError,
};
