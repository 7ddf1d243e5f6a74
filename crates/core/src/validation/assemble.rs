use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::draft::FormPayload;
use crate::domain::request::{
    fields, Contact, InstantRequest, JourneyRequest, Location, RequestDetails, RequestItem,
    RequestType, Schedule, ServiceLevel, ServiceRequest, ServiceType,
};
use crate::journey::JourneyStop;
use crate::validation::rules::{FieldError, FieldErrorKind, DATE_FORMAT, TIME_FORMAT};
use crate::validation::values::{as_bool, as_decimal, as_integer, as_text, is_missing};
use crate::validation::resolve_request_type;

/// Builds the typed request from a payload that has passed every step.
pub fn assemble_request(payload: &FormPayload) -> Result<ServiceRequest, FieldError> {
    let request_type = resolve_request_type(payload)
        .ok_or_else(|| FieldError::new(fields::REQUEST_TYPE, FieldErrorKind::Required))?;
    let details = assemble_details(payload)?;

    match request_type {
        RequestType::Instant => Ok(ServiceRequest::Instant(InstantRequest {
            pickup: location(
                payload,
                fields::PICKUP_LOCATION,
                fields::PICKUP_FLOOR,
                fields::PICKUP_HAS_ELEVATOR,
            )?,
            dropoff: location(
                payload,
                fields::DROPOFF_LOCATION,
                fields::DROPOFF_FLOOR,
                fields::DROPOFF_HAS_ELEVATOR,
            )?,
            details,
        })),
        RequestType::Journey => {
            let stops = payload
                .get(fields::JOURNEY_STOPS)
                .cloned()
                .ok_or_else(|| FieldError::new(fields::JOURNEY_STOPS, FieldErrorKind::Required))?;
            let stops: Vec<JourneyStop> = serde_json::from_value(stops)
                .map_err(|_| invalid(fields::JOURNEY_STOPS, "a list of journey stops"))?;
            Ok(ServiceRequest::Journey(JourneyRequest { stops, details }))
        }
    }
}

fn assemble_details(payload: &FormPayload) -> Result<RequestDetails, FieldError> {
    let service_type = required_text(payload, fields::SERVICE_TYPE)?;
    let service_type = ServiceType::parse(&service_type)
        .ok_or_else(|| invalid(fields::SERVICE_TYPE, "a known service type"))?;
    let service_level = required_text(payload, fields::SERVICE_LEVEL)?;
    let service_level = ServiceLevel::parse(&service_level)
        .ok_or_else(|| invalid(fields::SERVICE_LEVEL, "a known service level"))?;

    let preferred_date = required_text(payload, fields::PREFERRED_DATE)?;
    let preferred_date = NaiveDate::parse_from_str(&preferred_date, DATE_FORMAT)
        .map_err(|_| invalid(fields::PREFERRED_DATE, "a date (YYYY-MM-DD)"))?;
    let preferred_time = match optional_text(payload, fields::PREFERRED_TIME) {
        Some(raw) => Some(
            NaiveTime::parse_from_str(&raw, TIME_FORMAT)
                .map_err(|_| invalid(fields::PREFERRED_TIME, "a time (HH:MM)"))?,
        ),
        None => None,
    };

    Ok(RequestDetails {
        service_type,
        property_type: optional_text(payload, fields::PROPERTY_TYPE)
            .map(|value| value.to_ascii_lowercase()),
        items: items(payload)?,
        schedule: Schedule {
            preferred_date,
            preferred_time,
            staff_required: optional_integer(payload, fields::STAFF_REQUIRED)?
                .map(|staff| staff as u32),
            service_level,
            vehicle_type: optional_text(payload, fields::VEHICLE_TYPE)
                .map(|value| value.to_ascii_lowercase()),
            insurance_required: payload
                .get(fields::INSURANCE_REQUIRED)
                .and_then(as_bool)
                .unwrap_or(false),
            loading_hours: optional_decimal(payload, fields::LOADING_HOURS)?,
        },
        contact: Contact {
            name: required_text(payload, fields::CONTACT_NAME)?,
            phone: required_text(payload, fields::CONTACT_PHONE)?,
            email: optional_text(payload, fields::CONTACT_EMAIL),
            notes: optional_text(payload, fields::NOTES),
        },
    })
}

fn location(
    payload: &FormPayload,
    address_field: &str,
    floor_field: &str,
    elevator_field: &str,
) -> Result<Location, FieldError> {
    Ok(Location {
        address: required_text(payload, address_field)?,
        floor: optional_integer(payload, floor_field)?.map(|floor| floor as u8),
        has_elevator: payload.get(elevator_field).and_then(as_bool),
    })
}

fn items(payload: &FormPayload) -> Result<Vec<RequestItem>, FieldError> {
    let Some(entries) = payload.get(fields::ITEMS).and_then(Value::as_array) else {
        return Err(FieldError::new(fields::ITEMS, FieldErrorKind::Required));
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| -> Result<RequestItem, FieldError> {
            let reject = |reason: &str| {
                FieldError::new(
                    fields::ITEMS,
                    FieldErrorKind::InvalidItems { index, reason: reason.to_owned() },
                )
            };
            let name = entry.get("name").and_then(as_text).ok_or_else(|| reject("name is required"))?;
            let quantity = entry
                .get("quantity")
                .and_then(as_integer)
                .and_then(|quantity| u32::try_from(quantity).ok())
                .ok_or_else(|| reject("quantity must be a whole number"))?;
            let weight_kg = entry.get("weight_kg").filter(|value| !value.is_null()).and_then(as_decimal);
            Ok(RequestItem { name, quantity, weight_kg })
        })
        .collect()
}

fn required_text(payload: &FormPayload, field: &str) -> Result<String, FieldError> {
    optional_text(payload, field).ok_or_else(|| FieldError::new(field, FieldErrorKind::Required))
}

fn optional_text(payload: &FormPayload, field: &str) -> Option<String> {
    let value = payload.get(field);
    if is_missing(value) {
        return None;
    }
    value.and_then(as_text)
}

fn optional_integer(payload: &FormPayload, field: &str) -> Result<Option<i64>, FieldError> {
    let value = payload.get(field);
    if is_missing(value) {
        return Ok(None);
    }
    value.and_then(as_integer).map(Some).ok_or_else(|| invalid(field, "a whole number"))
}

fn optional_decimal(payload: &FormPayload, field: &str) -> Result<Option<Decimal>, FieldError> {
    let value = payload.get(field);
    if is_missing(value) {
        return Ok(None);
    }
    value.and_then(as_decimal).map(Some).ok_or_else(|| invalid(field, "a number"))
}

fn invalid(field: &str, expected: &str) -> FieldError {
    FieldError::new(field, FieldErrorKind::InvalidFormat { expected: expected.to_owned() })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::assemble_request;
    use crate::domain::pricing_factor::{FactorCategory, PricingFactor};
    use crate::domain::request::{RequestType, ServiceLevel, ServiceRequest};
    use crate::form::FormDefinition;
    use crate::journey::StopType;
    use crate::pricing::{factors::params, PricingContext};
    use crate::validation::rules::MAX_ITEM_WEIGHT_KG;
    use crate::validation::FieldErrorKind;

    fn shared() -> serde_json::Value {
        json!({
            "service_type": "moving",
            "items": [
                { "name": "wardrobe", "quantity": 1, "weight_kg": 80 },
                { "name": "box", "quantity": "4", "weight_kg": "17.5" }
            ],
            "preferred_date": "2026-11-07",
            "preferred_time": "08:30",
            "staff_required": "3",
            "service_level": "express",
            "insurance_required": true,
            "contact_name": "Ada Byron",
            "contact_phone": "07700900123"
        })
    }

    fn with(mut base: serde_json::Value, extra: serde_json::Value) -> crate::domain::draft::FormPayload {
        let object = base.as_object_mut().expect("object");
        for (key, value) in extra.as_object().expect("object") {
            object.insert(key.clone(), value.clone());
        }
        object.clone()
    }

    #[test]
    fn instant_payload_assembles_pickup_and_dropoff() {
        let payload = with(
            shared(),
            json!({
                "request_type": "instant",
                "pickup_location": "1 High Street",
                "pickup_floor": 3,
                "pickup_has_elevator": false,
                "dropoff_location": "9 Quay Road"
            }),
        );

        let request = assemble_request(&payload).expect("assemble instant");
        let ServiceRequest::Instant(instant) = &request else {
            panic!("expected instant request");
        };
        assert_eq!(instant.pickup.floor, Some(3));
        assert_eq!(instant.pickup.has_elevator, Some(false));
        assert_eq!(instant.dropoff.floor, None);
        assert_eq!(request.details().schedule.service_level, ServiceLevel::Express);
        assert_eq!(request.details().schedule.staff_required, Some(3));
        assert_eq!(
            request.details().schedule.preferred_date,
            NaiveDate::from_ymd_opt(2026, 11, 7).expect("date")
        );
        assert_eq!(request.total_weight_kg(), Some(Decimal::new(150, 0)));
    }

    #[test]
    fn journey_payload_carries_only_stops() {
        let payload = with(
            shared(),
            json!({
                "request_type": "journey",
                "pickup_location": "",
                "journey_stops": [
                    { "sequence": 0, "stop_type": "pickup", "address": "1 High Street" },
                    { "sequence": 1, "stop_type": "stop", "address": "2 Mill Lane" },
                    { "sequence": 2, "stop_type": "dropoff", "address": "9 Quay Road" }
                ]
            }),
        );

        let request = assemble_request(&payload).expect("assemble journey");
        assert_eq!(request.request_type(), RequestType::Journey);
        let ServiceRequest::Journey(journey) = request else {
            panic!("expected journey request");
        };
        assert_eq!(journey.stops.len(), 3);
        assert_eq!(journey.stops[1].stop_type, StopType::Stop);
    }

    #[test]
    fn oversized_item_weight_never_reaches_pricing() {
        let instant = json!({
            "request_type": "instant",
            "pickup_location": "1 High Street",
            "dropoff_location": "9 Quay Road"
        });
        let mut oversized = with(shared(), instant.clone());
        oversized.insert(
            "items".to_owned(),
            json!([{ "name": "crate", "quantity": 2, "weight_kg": "79228162514264337593543950335" }]),
        );
        let definition = FormDefinition::service_request();
        let error = definition.validate_all(&oversized).expect_err("weight above the ceiling");
        assert!(matches!(
            error.for_field("items").map(|error| &error.kind),
            Some(FieldErrorKind::InvalidItems { index: 0, .. })
        ));

        let mut heaviest = with(shared(), instant);
        heaviest.insert(
            "items".to_owned(),
            json!([{ "name": "piano", "quantity": 100, "weight_kg": MAX_ITEM_WEIGHT_KG }]),
        );
        definition.validate_all(&heaviest).expect("heaviest allowed payload");
        let request = assemble_request(&heaviest).expect("assemble");
        let heavy = PricingFactor::new("pf-heavy", FactorCategory::Weight)
            .with_parameter(params::THRESHOLD_KG, Decimal::new(100, 0))
            .with_parameter(params::SURCHARGE, Decimal::new(50, 0));
        let quote = PricingContext::new(Decimal::new(499, 0), "GBP", vec![heavy]).quote(&request);
        assert_eq!(quote.total, Decimal::new(549, 0));
    }

    #[test]
    fn missing_discriminator_is_reported_as_required() {
        let error = assemble_request(&with(shared(), json!({}))).expect_err("no request type");
        assert_eq!(error.field, "request_type");
        assert_eq!(error.kind, FieldErrorKind::Required);
    }
}
