use chrono::{Datelike, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::ServiceRequest;

/// Request facts the pricing factors key on. `None` means unknown, and a
/// factor whose attribute is unknown does not apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestAttributes {
    pub distance_km: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
    pub is_peak_hour: Option<bool>,
    pub is_weekend: Option<bool>,
    pub adverse_weather: Option<bool>,
    pub vehicle_type: Option<String>,
    pub zone: Option<String>,
    pub service_level: Option<String>,
    pub staff_required: Option<u32>,
    pub property_type: Option<String>,
    pub insurance_required: Option<bool>,
    pub loading_hours: Option<Decimal>,
}

impl RequestAttributes {
    /// Attributes a validated request carries on its own. Distance, peak-hour,
    /// weather and zone come from outside the form.
    pub fn from_request(request: &ServiceRequest) -> Self {
        let details = request.details();
        let schedule = &details.schedule;
        let weekday = schedule.preferred_date.weekday();

        Self {
            weight_kg: request.total_weight_kg(),
            is_weekend: Some(matches!(weekday, Weekday::Sat | Weekday::Sun)),
            vehicle_type: schedule.vehicle_type.clone(),
            service_level: Some(schedule.service_level.as_str().to_owned()),
            staff_required: schedule.staff_required,
            property_type: details.property_type.clone(),
            insurance_required: Some(schedule.insurance_required),
            loading_hours: schedule.loading_hours,
            ..Self::default()
        }
    }

    /// Fills unknown attributes from `other`; known values are kept.
    pub fn merged_with(mut self, other: &RequestAttributes) -> Self {
        fn fill<T: Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(fallback);
            }
        }

        fill(&mut self.distance_km, &other.distance_km);
        fill(&mut self.weight_kg, &other.weight_kg);
        fill(&mut self.is_peak_hour, &other.is_peak_hour);
        fill(&mut self.is_weekend, &other.is_weekend);
        fill(&mut self.adverse_weather, &other.adverse_weather);
        fill(&mut self.vehicle_type, &other.vehicle_type);
        fill(&mut self.zone, &other.zone);
        fill(&mut self.service_level, &other.service_level);
        fill(&mut self.staff_required, &other.staff_required);
        fill(&mut self.property_type, &other.property_type);
        fill(&mut self.insurance_required, &other.insurance_required);
        fill(&mut self.loading_hours, &other.loading_hours);
        self
    }

    pub fn with_distance_km(mut self, distance_km: Decimal) -> Self {
        self.distance_km = Some(distance_km);
        self
    }

    pub fn with_weight_kg(mut self, weight_kg: Decimal) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }
}
