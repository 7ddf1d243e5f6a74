use std::collections::BTreeSet;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::request::{
    fields, RequestType, PROPERTY_TYPES, REQUEST_TYPES, SERVICE_LEVELS, SERVICE_TYPES,
    VEHICLE_TYPES,
};
use crate::journey::MAX_FLOOR;
use crate::validation::{Constraint, FieldRule, StepSchema, ValidationErrors};
use crate::domain::draft::FormPayload;

pub const MAX_ITEM_QUANTITY: i64 = 100;
pub const MAX_STAFF: i64 = 10;
pub const MAX_LOADING_HOURS: i64 = 24;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormStep {
    pub position: usize,
    pub title: String,
    schema: StepSchema,
}

impl FormStep {
    pub fn new(position: usize, title: impl Into<String>, rules: Vec<FieldRule>) -> Self {
        Self { position, title: title.into(), schema: StepSchema::new(rules) }
    }

    pub fn schema(&self) -> &StepSchema {
        &self.schema
    }

    pub fn fields(&self) -> BTreeSet<&str> {
        self.schema.fields().collect()
    }

    pub fn owns(&self, field: &str) -> bool {
        self.schema.fields().any(|owned| owned == field)
    }

    pub fn validate(&self, payload: &FormPayload) -> Result<(), ValidationErrors> {
        self.schema.validate(self.position, payload)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormDefinitionError {
    #[error("a form needs at least one step")]
    Empty,
    #[error("step at index {index} declares position {position}")]
    NonContiguous { index: usize, position: usize },
    #[error("field `{field}` is owned by both step {first} and step {second}")]
    SharedField { field: String, first: usize, second: usize },
}

/// Ordered steps with contiguous positions and disjoint field sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormDefinition {
    steps: Vec<FormStep>,
}

impl FormDefinition {
    pub fn new(steps: Vec<FormStep>) -> Result<Self, FormDefinitionError> {
        if steps.is_empty() {
            return Err(FormDefinitionError::Empty);
        }

        let mut owners: Vec<(String, usize)> = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            if step.position != index {
                return Err(FormDefinitionError::NonContiguous { index, position: step.position });
            }
            for field in step.schema.fields() {
                if let Some((_, first)) = owners.iter().find(|(owned, _)| owned == field) {
                    return Err(FormDefinitionError::SharedField {
                        field: field.to_owned(),
                        first: *first,
                        second: index,
                    });
                }
                owners.push((field.to_owned(), index));
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[FormStep] {
        &self.steps
    }

    pub fn step(&self, position: usize) -> Option<&FormStep> {
        self.steps.get(position)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_position(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn owner_of(&self, field: &str) -> Option<usize> {
        self.steps.iter().find(|step| step.owns(field)).map(|step| step.position)
    }

    pub fn all_fields(&self) -> BTreeSet<&str> {
        self.steps.iter().flat_map(|step| step.schema.fields()).collect()
    }

    /// First failing step, validated in order.
    pub fn validate_all(&self, payload: &FormPayload) -> Result<(), ValidationErrors> {
        self.steps.iter().try_for_each(|step| step.validate(payload))
    }

    /// Service details, items, schedule, contact.
    pub fn service_request() -> Self {
        let floor = Constraint::Integer { min: 0, max: i64::from(MAX_FLOOR) };
        let address = Constraint::Text { min_len: 3, max_len: 200 };

        let steps = vec![
            FormStep::new(
                0,
                "Service details",
                vec![
                    FieldRule::required(fields::REQUEST_TYPE, Constraint::OneOf(REQUEST_TYPES)),
                    FieldRule::required(fields::SERVICE_TYPE, Constraint::OneOf(SERVICE_TYPES)),
                    FieldRule::optional(fields::PROPERTY_TYPE, Constraint::OneOf(PROPERTY_TYPES)),
                    FieldRule::required_for(
                        RequestType::Instant,
                        fields::PICKUP_LOCATION,
                        address.clone(),
                    ),
                    FieldRule::optional(fields::PICKUP_FLOOR, floor.clone()),
                    FieldRule::optional(fields::PICKUP_HAS_ELEVATOR, Constraint::Boolean),
                    FieldRule::required_for(
                        RequestType::Instant,
                        fields::DROPOFF_LOCATION,
                        address,
                    ),
                    FieldRule::optional(fields::DROPOFF_FLOOR, floor),
                    FieldRule::optional(fields::DROPOFF_HAS_ELEVATOR, Constraint::Boolean),
                    FieldRule::required_for(
                        RequestType::Journey,
                        fields::JOURNEY_STOPS,
                        Constraint::Stops,
                    ),
                ],
            ),
            FormStep::new(
                1,
                "Items",
                vec![FieldRule::required(
                    fields::ITEMS,
                    Constraint::Items { max_quantity: MAX_ITEM_QUANTITY },
                )],
            ),
            FormStep::new(
                2,
                "Schedule",
                vec![
                    FieldRule::required(fields::PREFERRED_DATE, Constraint::Date),
                    FieldRule::optional(fields::PREFERRED_TIME, Constraint::Time),
                    FieldRule::optional(
                        fields::STAFF_REQUIRED,
                        Constraint::Integer { min: 1, max: MAX_STAFF },
                    ),
                    FieldRule::required(fields::SERVICE_LEVEL, Constraint::OneOf(SERVICE_LEVELS)),
                    FieldRule::optional(fields::VEHICLE_TYPE, Constraint::OneOf(VEHICLE_TYPES)),
                    FieldRule::optional(fields::INSURANCE_REQUIRED, Constraint::Boolean),
                    FieldRule::optional(
                        fields::LOADING_HOURS,
                        Constraint::Decimal {
                            min: Decimal::ZERO,
                            max: Decimal::from(MAX_LOADING_HOURS),
                        },
                    ),
                ],
            ),
            FormStep::new(
                3,
                "Contact",
                vec![
                    FieldRule::required(
                        fields::CONTACT_NAME,
                        Constraint::Text { min_len: 2, max_len: 100 },
                    ),
                    FieldRule::required(
                        fields::CONTACT_PHONE,
                        Constraint::Text { min_len: 6, max_len: 20 },
                    ),
                    FieldRule::optional(fields::CONTACT_EMAIL, Constraint::Email),
                    FieldRule::optional(fields::NOTES, Constraint::Text { min_len: 0, max_len: 1000 }),
                ],
            ),
        ];

        Self { steps }
    }
}

#[cfg(test)]
mod tests {
    use super::{FormDefinition, FormDefinitionError, FormStep};
    use crate::domain::request::fields;
    use crate::validation::{Constraint, FieldRule};

    #[test]
    fn service_request_definition_holds_its_own_invariants() {
        let definition = FormDefinition::service_request();
        let rebuilt = FormDefinition::new(definition.steps().to_vec()).expect("valid definition");

        assert_eq!(rebuilt.len(), 4);
        assert_eq!(rebuilt.owner_of(fields::JOURNEY_STOPS), Some(0));
        assert_eq!(rebuilt.owner_of(fields::ITEMS), Some(1));
        assert_eq!(rebuilt.owner_of(fields::CONTACT_EMAIL), Some(3));
        assert_eq!(rebuilt.all_fields().len(), 22);
    }

    #[test]
    fn shared_fields_are_rejected() {
        let error = FormDefinition::new(vec![
            FormStep::new(0, "one", vec![FieldRule::required("notes", Constraint::Boolean)]),
            FormStep::new(1, "two", vec![FieldRule::optional("notes", Constraint::Boolean)]),
        ])
        .expect_err("shared field");

        assert_eq!(
            error,
            FormDefinitionError::SharedField { field: "notes".to_owned(), first: 0, second: 1 }
        );
    }

    #[test]
    fn positions_must_run_from_zero_without_gaps() {
        let error = FormDefinition::new(vec![
            FormStep::new(0, "one", vec![]),
            FormStep::new(2, "three", vec![]),
        ])
        .expect_err("gap");

        assert_eq!(error, FormDefinitionError::NonContiguous { index: 1, position: 2 });
        assert_eq!(FormDefinition::new(vec![]).expect_err("empty"), FormDefinitionError::Empty);
    }
}
