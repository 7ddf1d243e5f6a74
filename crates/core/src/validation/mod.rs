//! Declarative per-step validation.
//!
//! Conditional rules are keyed on the `request_type` discriminator. The
//! discriminator is resolved once per evaluation and the matching branch is
//! applied whole; when it cannot be resolved no conditional rule runs.

pub mod assemble;
pub mod rules;
pub mod values;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::draft::FormPayload;
use crate::domain::request::{fields, RequestType};

pub use assemble::assemble_request;
pub use rules::{Constraint, FieldError, FieldErrorKind, FieldRule, Requirement};

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("step {step} has {} invalid field(s)", .errors.len())]
pub struct ValidationErrors {
    pub step: usize,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|error| error.field == field)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepSchema {
    rules: Vec<FieldRule>,
}

impl StepSchema {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.field.as_str())
    }

    /// Returns every failing field of this step, in rule order.
    pub fn evaluate(&self, payload: &FormPayload) -> Vec<FieldError> {
        let branch = resolve_request_type(payload);
        let mut errors = Vec::new();

        for rule in &self.rules {
            let required = match rule.requirement {
                Requirement::Always => true,
                Requirement::Optional => false,
                Requirement::WhenRequestType(request_type) => match branch {
                    Some(active) => active == request_type,
                    None => continue,
                },
            };

            if let Some(error) = rules::check_rule(rule, required, payload.get(&rule.field)) {
                errors.push(error);
            }
        }

        errors
    }

    pub fn validate(&self, step: usize, payload: &FormPayload) -> Result<(), ValidationErrors> {
        let errors = self.evaluate(payload);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { step, errors })
        }
    }
}

pub fn resolve_request_type(payload: &FormPayload) -> Option<RequestType> {
    payload.get(fields::REQUEST_TYPE).and_then(|value| value.as_str()).and_then(RequestType::parse)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{resolve_request_type, Constraint, FieldErrorKind, FieldRule, StepSchema};
    use crate::domain::draft::FormPayload;
    use crate::domain::request::{RequestType, REQUEST_TYPES};

    fn payload(value: Value) -> FormPayload {
        value.as_object().cloned().expect("object payload")
    }

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldRule::required("request_type", Constraint::OneOf(REQUEST_TYPES)),
            FieldRule::required_for(
                RequestType::Instant,
                "pickup_location",
                Constraint::Text { min_len: 3, max_len: 200 },
            ),
            FieldRule::optional("pickup_floor", Constraint::Integer { min: 0, max: 100 }),
        ])
    }

    #[test]
    fn conditional_field_follows_the_active_branch() {
        let instant = schema().evaluate(&payload(json!({ "request_type": "instant" })));
        assert_eq!(instant.len(), 1);
        assert_eq!(instant[0].field, "pickup_location");
        assert_eq!(instant[0].kind, FieldErrorKind::Required);

        let journey = schema().evaluate(&payload(json!({ "request_type": "journey" })));
        assert!(journey.is_empty());
    }

    #[test]
    fn unresolved_discriminator_skips_every_conditional_rule() {
        let errors = schema().evaluate(&payload(json!({ "request_type": "teleport" })));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "request_type");
        assert!(matches!(errors[0].kind, FieldErrorKind::NotAllowed { .. }));
    }

    #[test]
    fn optional_numeric_fields_still_enforce_bounds() {
        let result = schema().validate(
            0,
            &payload(json!({
                "request_type": "journey",
                "pickup_floor": 250
            })),
        );
        let errors = result.expect_err("floor out of range");
        assert_eq!(errors.step, 0);
        assert!(matches!(
            errors.for_field("pickup_floor").map(|error| &error.kind),
            Some(FieldErrorKind::OutOfRange { .. })
        ));
    }

    #[test]
    fn discriminator_parse_is_case_insensitive() {
        assert_eq!(
            resolve_request_type(&payload(json!({ "request_type": "Journey" }))),
            Some(RequestType::Journey)
        );
        assert_eq!(resolve_request_type(&payload(json!({}))), None);
    }
}
