use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PricingFactorId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    Distance,
    Weight,
    Time,
    Weather,
    VehicleType,
    Location,
    ServiceLevel,
    StaffRequired,
    PropertyType,
    Insurance,
    LoadingTime,
}

impl FactorCategory {
    pub const ALL: [FactorCategory; 11] = [
        Self::Distance,
        Self::Weight,
        Self::Time,
        Self::Weather,
        Self::VehicleType,
        Self::Location,
        Self::ServiceLevel,
        Self::StaffRequired,
        Self::PropertyType,
        Self::Insurance,
        Self::LoadingTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Weight => "weight",
            Self::Time => "time",
            Self::Weather => "weather",
            Self::VehicleType => "vehicle_type",
            Self::Location => "location",
            Self::ServiceLevel => "service_level",
            Self::StaffRequired => "staff_required",
            Self::PropertyType => "property_type",
            Self::Insurance => "insurance",
            Self::LoadingTime => "loading_time",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_").replace(' ', "_");
        Self::ALL.into_iter().find(|category| category.as_str() == normalized)
    }
}

impl std::fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrator-authored pricing rule. Only the parameter names understood by
/// the factor's own category are read; anything else is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingFactor {
    pub id: PricingFactorId,
    #[serde(default)]
    pub name: String,
    pub category: FactorCategory,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Attribute value a categorical factor matches, e.g. `luton_van`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Decimal>,
}

fn default_active() -> bool {
    true
}

impl PricingFactor {
    pub fn new(id: impl Into<String>, category: FactorCategory) -> Self {
        Self {
            id: PricingFactorId(id.into()),
            name: String::new(),
            category,
            active: true,
            selector: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: Decimal) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn parameter(&self, key: &str) -> Option<Decimal> {
        self.parameters.get(key).copied()
    }
}
