use thiserror::Error;

use crate::drafts::DraftError;
use crate::form::{EditError, NavigationError, SubmitError};
use crate::journey::JourneyError;
use crate::validation::ValidationErrors;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Navigation(#[from] NavigationError),
    #[error(transparent)]
    Journey(#[from] JourneyError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<DraftError> for ApplicationError {
    fn from(value: DraftError) -> Self {
        match value {
            DraftError::Corrupt { .. } | DraftError::NotFound(_) => {
                Self::Domain(DomainError::InvariantViolation(value.to_string()))
            }
            DraftError::Storage(_) | DraftError::Unavailable(_) => {
                Self::Persistence(value.to_string())
            }
        }
    }
}

impl From<EditError> for ApplicationError {
    fn from(value: EditError) -> Self {
        match value {
            EditError::Journey(error) => Self::Domain(DomainError::Journey(error)),
            other => Self::Domain(DomainError::InvariantViolation(other.to_string())),
        }
    }
}

impl From<SubmitError> for ApplicationError {
    fn from(value: SubmitError) -> Self {
        match value {
            SubmitError::Validation(errors) => Self::Domain(DomainError::Validation(errors)),
            SubmitError::Assemble(error) => {
                Self::Domain(DomainError::InvariantViolation(error.to_string()))
            }
            SubmitError::Submission(error) => Self::Integration(error.to_string()),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Your draft is kept; please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(error) => Self::BadRequest {
                message: error.to_string(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::draft::DraftId;
    use crate::drafts::DraftError;
    use crate::errors::{ApplicationError, DomainError, InterfaceError};
    use crate::form::{SubmissionError, SubmitError};
    use crate::journey::JourneyError;

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = ApplicationError::from(DomainError::Journey(JourneyError::MinimumStops {
            minimum: 2,
            remaining: 1,
        }))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn corrupt_draft_is_a_domain_problem_but_an_outage_is_not() {
        let corrupt = ApplicationError::from(DraftError::Corrupt {
            id: DraftId("DRAFT-1".to_owned()),
            reason: "items must be a list".to_owned(),
        });
        assert!(matches!(corrupt, ApplicationError::Domain(DomainError::InvariantViolation(_))));

        let offline = ApplicationError::from(DraftError::Unavailable("remote".to_owned()));
        assert!(matches!(offline, ApplicationError::Persistence(_)));
    }

    #[test]
    fn submission_network_failure_maps_to_service_unavailable() {
        let interface = ApplicationError::from(SubmitError::Submission(SubmissionError::Network(
            "connection reset".to_owned(),
        )))
        .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(
            interface.user_message(),
            "The service is temporarily unavailable. Your draft is kept; please retry shortly."
        );
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface = ApplicationError::Configuration("invalid api base url".to_owned())
            .into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }
}
