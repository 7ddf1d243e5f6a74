use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::journey::JourneyStop;

/// Payload field names shared by validation, assembly and the form controller.
pub mod fields {
    pub const REQUEST_TYPE: &str = "request_type";
    pub const SERVICE_TYPE: &str = "service_type";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const PICKUP_LOCATION: &str = "pickup_location";
    pub const PICKUP_FLOOR: &str = "pickup_floor";
    pub const PICKUP_HAS_ELEVATOR: &str = "pickup_has_elevator";
    pub const DROPOFF_LOCATION: &str = "dropoff_location";
    pub const DROPOFF_FLOOR: &str = "dropoff_floor";
    pub const DROPOFF_HAS_ELEVATOR: &str = "dropoff_has_elevator";
    pub const JOURNEY_STOPS: &str = "journey_stops";
    pub const ITEMS: &str = "items";
    pub const PREFERRED_DATE: &str = "preferred_date";
    pub const PREFERRED_TIME: &str = "preferred_time";
    pub const STAFF_REQUIRED: &str = "staff_required";
    pub const SERVICE_LEVEL: &str = "service_level";
    pub const VEHICLE_TYPE: &str = "vehicle_type";
    pub const INSURANCE_REQUIRED: &str = "insurance_required";
    pub const LOADING_HOURS: &str = "loading_hours";
    pub const CONTACT_NAME: &str = "contact_name";
    pub const CONTACT_PHONE: &str = "contact_phone";
    pub const CONTACT_EMAIL: &str = "contact_email";
    pub const NOTES: &str = "notes";
}

pub const REQUEST_TYPES: &[&str] = &["instant", "journey"];
pub const SERVICE_TYPES: &[&str] = &["moving", "waste_collection"];
pub const PROPERTY_TYPES: &[&str] = &["house", "flat", "office", "storage"];
pub const SERVICE_LEVELS: &[&str] = &["standard", "express", "premium"];
pub const VEHICLE_TYPES: &[&str] = &["small_van", "luton_van", "truck"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Instant,
    Journey,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Journey => "journey",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "instant" => Some(Self::Instant),
            "journey" => Some(Self::Journey),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Moving,
    WasteCollection,
}

impl ServiceType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "moving" => Some(Self::Moving),
            "waste_collection" => Some(Self::WasteCollection),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLevel {
    Standard,
    Express,
    Premium,
}

impl ServiceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Premium => "premium",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "express" => Some(Self::Express),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_elevator: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub preferred_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_required: Option<u32>,
    pub service_level: ServiceLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub insurance_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_hours: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Sections every request carries regardless of its type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDetails {
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    pub items: Vec<RequestItem>,
    pub schedule: Schedule,
    pub contact: Contact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantRequest {
    pub pickup: Location,
    pub dropoff: Location,
    pub details: RequestDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyRequest {
    pub stops: Vec<JourneyStop>,
    pub details: RequestDetails,
}

/// A fully validated request. Each variant carries only the fields its
/// request type requires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum ServiceRequest {
    Instant(InstantRequest),
    Journey(JourneyRequest),
}

impl ServiceRequest {
    pub fn request_type(&self) -> RequestType {
        match self {
            Self::Instant(_) => RequestType::Instant,
            Self::Journey(_) => RequestType::Journey,
        }
    }

    pub fn details(&self) -> &RequestDetails {
        match self {
            Self::Instant(request) => &request.details,
            Self::Journey(request) => &request.details,
        }
    }

    /// Sum of item weights, when at least one item reports a weight. A total
    /// that cannot be represented is treated as unknown.
    pub fn total_weight_kg(&self) -> Option<Decimal> {
        let mut total: Option<Decimal> = None;
        for item in &self.details().items {
            let Some(weight) = item.weight_kg else {
                continue;
            };
            let sum = weight
                .checked_mul(Decimal::from(item.quantity))
                .and_then(|line| total.unwrap_or(Decimal::ZERO).checked_add(line));
            match sum {
                Some(sum) => total = Some(sum),
                None => {
                    tracing::warn!(
                        event_name = "request.weight_overflow",
                        item = %item.name,
                        "total item weight overflows, leaving weight unknown"
                    );
                    return None;
                }
            }
        }
        total
    }
}
