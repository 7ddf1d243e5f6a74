use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::request::RequestType;
use crate::journey::{check_stops, JourneyStop};
use crate::validation::values::{as_bool, as_decimal, as_integer, as_text, is_missing};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
/// Heaviest single item a request may declare.
pub const MAX_ITEM_WEIGHT_KG: i64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Always,
    Optional,
    /// Required under one request type, optional under the others.
    WhenRequestType(RequestType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Text { min_len: usize, max_len: usize },
    Integer { min: i64, max: i64 },
    Decimal { min: Decimal, max: Decimal },
    OneOf(&'static [&'static str]),
    Date,
    Time,
    Email,
    Boolean,
    Items { max_quantity: i64 },
    Stops,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRule {
    pub field: String,
    pub requirement: Requirement,
    pub constraint: Constraint,
}

impl FieldRule {
    pub fn required(field: impl Into<String>, constraint: Constraint) -> Self {
        Self { field: field.into(), requirement: Requirement::Always, constraint }
    }

    pub fn optional(field: impl Into<String>, constraint: Constraint) -> Self {
        Self { field: field.into(), requirement: Requirement::Optional, constraint }
    }

    pub fn required_for(
        request_type: RequestType,
        field: impl Into<String>,
        constraint: Constraint,
    ) -> Self {
        Self {
            field: field.into(),
            requirement: Requirement::WhenRequestType(request_type),
            constraint,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum FieldErrorKind {
    Required,
    OutOfRange { min: String, max: String },
    InvalidFormat { expected: String },
    NotAllowed { allowed: Vec<String> },
    InvalidItems { index: usize, reason: String },
    InvalidStops { issues: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

impl FieldError {
    pub fn new(field: impl Into<String>, kind: FieldErrorKind) -> Self {
        Self { field: field.into(), kind }
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            FieldErrorKind::Required => "required",
            FieldErrorKind::OutOfRange { .. } => "out_of_range",
            FieldErrorKind::InvalidFormat { .. } => "invalid_format",
            FieldErrorKind::NotAllowed { .. } => "not_allowed",
            FieldErrorKind::InvalidItems { .. } => "invalid_items",
            FieldErrorKind::InvalidStops { .. } => "invalid_stops",
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            FieldErrorKind::Required => write!(f, "{} is required", self.field),
            FieldErrorKind::OutOfRange { min, max } => {
                write!(f, "{} must be between {min} and {max}", self.field)
            }
            FieldErrorKind::InvalidFormat { expected } => {
                write!(f, "{} must be {expected}", self.field)
            }
            FieldErrorKind::NotAllowed { allowed } => {
                write!(f, "{} must be one of {}", self.field, allowed.join(", "))
            }
            FieldErrorKind::InvalidItems { index, reason } => {
                write!(f, "{} entry {index}: {reason}", self.field)
            }
            FieldErrorKind::InvalidStops { issues } => {
                write!(f, "{}: {}", self.field, issues.join("; "))
            }
        }
    }
}

/// Applies a rule given whether the active branch requires the field.
pub(crate) fn check_rule(
    rule: &FieldRule,
    required: bool,
    value: Option<&Value>,
) -> Option<FieldError> {
    if is_missing(value) {
        return required.then(|| FieldError::new(&rule.field, FieldErrorKind::Required));
    }

    let value = value?;
    check_constraint(&rule.constraint, value)
        .err()
        .map(|kind| FieldError::new(&rule.field, kind))
}

fn check_constraint(constraint: &Constraint, value: &Value) -> Result<(), FieldErrorKind> {
    match constraint {
        Constraint::Text { min_len, max_len } => {
            let text = as_text(value).ok_or_else(|| invalid("text"))?;
            let len = text.chars().count();
            if len < *min_len || len > *max_len {
                return Err(FieldErrorKind::OutOfRange {
                    min: min_len.to_string(),
                    max: max_len.to_string(),
                });
            }
            Ok(())
        }
        Constraint::Integer { min, max } => {
            let number = as_integer(value).ok_or_else(|| invalid("a whole number"))?;
            if number < *min || number > *max {
                return Err(FieldErrorKind::OutOfRange { min: min.to_string(), max: max.to_string() });
            }
            Ok(())
        }
        Constraint::Decimal { min, max } => {
            let number = as_decimal(value).ok_or_else(|| invalid("a number"))?;
            if number < *min || number > *max {
                return Err(FieldErrorKind::OutOfRange { min: min.to_string(), max: max.to_string() });
            }
            Ok(())
        }
        Constraint::OneOf(allowed) => {
            let text = as_text(value).ok_or_else(|| invalid("text"))?;
            if allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(&text)) {
                return Ok(());
            }
            Err(FieldErrorKind::NotAllowed {
                allowed: allowed.iter().map(|candidate| (*candidate).to_owned()).collect(),
            })
        }
        Constraint::Date => {
            let text = as_text(value).ok_or_else(|| invalid("a date (YYYY-MM-DD)"))?;
            NaiveDate::parse_from_str(&text, DATE_FORMAT)
                .map(|_| ())
                .map_err(|_| invalid("a date (YYYY-MM-DD)"))
        }
        Constraint::Time => {
            let text = as_text(value).ok_or_else(|| invalid("a time (HH:MM)"))?;
            NaiveTime::parse_from_str(&text, TIME_FORMAT)
                .map(|_| ())
                .map_err(|_| invalid("a time (HH:MM)"))
        }
        Constraint::Email => {
            let text = as_text(value).ok_or_else(|| invalid("an email address"))?;
            if looks_like_email(&text) {
                Ok(())
            } else {
                Err(invalid("an email address"))
            }
        }
        Constraint::Boolean => as_bool(value).map(|_| ()).ok_or_else(|| invalid("true or false")),
        Constraint::Items { max_quantity } => check_items(value, *max_quantity),
        Constraint::Stops => {
            let stops: Vec<JourneyStop> = serde_json::from_value(value.clone())
                .map_err(|_| invalid("a list of journey stops"))?;
            let issues = check_stops(&stops);
            if issues.is_empty() {
                return Ok(());
            }
            Err(FieldErrorKind::InvalidStops {
                issues: issues.iter().map(ToString::to_string).collect(),
            })
        }
    }
}

fn check_items(value: &Value, max_quantity: i64) -> Result<(), FieldErrorKind> {
    let items = value.as_array().ok_or_else(|| invalid("a list of items"))?;

    for (index, item) in items.iter().enumerate() {
        let reject = |reason: &str| FieldErrorKind::InvalidItems { index, reason: reason.to_owned() };
        let Some(item) = item.as_object() else {
            return Err(reject("entry must be an object"));
        };

        if is_missing(item.get("name")) {
            return Err(reject("name is required"));
        }

        match item.get("quantity").and_then(as_integer) {
            Some(quantity) if (1..=max_quantity).contains(&quantity) => {}
            Some(_) => return Err(reject(&format!("quantity must be between 1 and {max_quantity}"))),
            None => return Err(reject("quantity must be a whole number")),
        }

        if let Some(weight) = item.get("weight_kg").filter(|weight| !weight.is_null()) {
            match as_decimal(weight) {
                Some(weight) if weight < Decimal::ZERO => {
                    return Err(reject("weight_kg must be a non-negative number"))
                }
                Some(weight) if weight > Decimal::from(MAX_ITEM_WEIGHT_KG) => {
                    return Err(reject(&format!("weight_kg must not exceed {MAX_ITEM_WEIGHT_KG}")))
                }
                Some(_) => {}
                None => return Err(reject("weight_kg must be a non-negative number")),
            }
        }
    }

    Ok(())
}

fn looks_like_email(text: &str) -> bool {
    if text.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

fn invalid(expected: &str) -> FieldErrorKind {
    FieldErrorKind::InvalidFormat { expected: expected.to_owned() }
}
