use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::pricing_factor::{FactorCategory, PricingFactor};
use crate::pricing::attributes::RequestAttributes;

/// Parameter names read per category.
pub mod params {
    pub const RATE_PER_KM: &str = "rate_per_km";
    pub const INCLUDED_KM: &str = "included_km";
    pub const MIN_CHARGE: &str = "min_charge";
    pub const MAX_CHARGE: &str = "max_charge";
    pub const THRESHOLD_KG: &str = "threshold_kg";
    pub const SURCHARGE: &str = "surcharge";
    pub const RATE_PER_KG: &str = "rate_per_kg";
    pub const RATE_PER_KG_BEYOND: &str = "rate_per_kg_beyond";
    pub const PEAK_MULTIPLIER: &str = "peak_multiplier";
    pub const WEEKEND_MULTIPLIER: &str = "weekend_multiplier";
    pub const MULTIPLIER: &str = "multiplier";
    pub const RATE_PER_PERSON: &str = "rate_per_person";
    pub const INCLUDED_STAFF: &str = "included_staff";
    pub const RATE_PER_HOUR: &str = "rate_per_hour";
    pub const INCLUDED_HOURS: &str = "included_hours";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FactorEffect {
    Additive { amount: Decimal, detail: String },
    Multiplier { factor: Decimal, detail: String },
    NotApplicable,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FactorConfigError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("categorical factor has no selector")]
    MissingSelector,
    #[error("parameter `{param}` is invalid: {reason}")]
    InvalidParameter { param: &'static str, reason: String },
    #[error("factor defines neither `surcharge` nor `multiplier`")]
    NoEffect,
    #[error("charge using `{0}` overflows")]
    Overflow(&'static str),
}

pub fn evaluate(
    factor: &PricingFactor,
    attributes: &RequestAttributes,
) -> Result<FactorEffect, FactorConfigError> {
    match factor.category {
        FactorCategory::Distance => match attributes.distance_km {
            Some(distance) => distance_charge(factor, distance),
            None => Ok(FactorEffect::NotApplicable),
        },
        FactorCategory::Weight => match attributes.weight_kg {
            Some(weight) => weight_charge(factor, weight),
            None => Ok(FactorEffect::NotApplicable),
        },
        FactorCategory::Time => time_multiplier(factor, attributes),
        FactorCategory::Weather => match attributes.adverse_weather {
            Some(true) => {
                let multiplier = positive(factor, params::MULTIPLIER)?;
                Ok(FactorEffect::Multiplier {
                    factor: multiplier,
                    detail: "adverse weather".to_owned(),
                })
            }
            _ => Ok(FactorEffect::NotApplicable),
        },
        FactorCategory::VehicleType => selector_match(factor, attributes.vehicle_type.as_deref()),
        FactorCategory::Location => selector_match(factor, attributes.zone.as_deref()),
        FactorCategory::ServiceLevel => selector_match(factor, attributes.service_level.as_deref()),
        FactorCategory::PropertyType => selector_match(factor, attributes.property_type.as_deref()),
        FactorCategory::StaffRequired => match attributes.staff_required {
            Some(staff) => per_unit_beyond(
                factor,
                Decimal::from(staff),
                params::RATE_PER_PERSON,
                params::INCLUDED_STAFF,
                Decimal::ONE,
                "staff",
            ),
            None => Ok(FactorEffect::NotApplicable),
        },
        FactorCategory::Insurance => match attributes.insurance_required {
            Some(true) => flat_or_multiplier(factor, "insurance cover".to_owned()),
            _ => Ok(FactorEffect::NotApplicable),
        },
        FactorCategory::LoadingTime => match attributes.loading_hours {
            Some(hours) => per_unit_beyond(
                factor,
                hours,
                params::RATE_PER_HOUR,
                params::INCLUDED_HOURS,
                Decimal::ZERO,
                "loading hours",
            ),
            None => Ok(FactorEffect::NotApplicable),
        },
    }
}

fn distance_charge(
    factor: &PricingFactor,
    distance: Decimal,
) -> Result<FactorEffect, FactorConfigError> {
    let rate = required(factor, params::RATE_PER_KM)?;
    let included = factor.parameter(params::INCLUDED_KM).unwrap_or(Decimal::ZERO);
    let billable = checked(params::INCLUDED_KM, distance.checked_sub(included))?.max(Decimal::ZERO);
    let mut amount = checked(params::RATE_PER_KM, billable.checked_mul(rate))?;

    let min_charge = factor.parameter(params::MIN_CHARGE);
    let max_charge = factor.parameter(params::MAX_CHARGE);
    if let (Some(min), Some(max)) = (min_charge, max_charge) {
        if min > max {
            return Err(FactorConfigError::InvalidParameter {
                param: params::MIN_CHARGE,
                reason: format!("{min} exceeds max_charge {max}"),
            });
        }
    }
    if let Some(min) = min_charge {
        amount = amount.max(min);
    }
    if let Some(max) = max_charge {
        amount = amount.min(max);
    }

    Ok(FactorEffect::Additive { amount, detail: format!("{billable} km x {rate}") })
}

/// Threshold factors are all-or-nothing: nothing below the threshold, the full
/// surcharge at or above it, plus an optional per-kg rate past it.
fn weight_charge(factor: &PricingFactor, weight: Decimal) -> Result<FactorEffect, FactorConfigError> {
    let Some(threshold) = factor.parameter(params::THRESHOLD_KG) else {
        let rate = factor
            .parameter(params::RATE_PER_KG)
            .ok_or(FactorConfigError::MissingParameter(params::THRESHOLD_KG))?;
        return Ok(FactorEffect::Additive {
            amount: checked(params::RATE_PER_KG, weight.checked_mul(rate))?,
            detail: format!("{weight} kg x {rate}"),
        });
    };

    let surcharge = required(factor, params::SURCHARGE)?;
    if weight < threshold {
        return Ok(FactorEffect::Additive {
            amount: Decimal::ZERO,
            detail: format!("{weight} kg below {threshold} kg threshold"),
        });
    }

    let beyond = match factor.parameter(params::RATE_PER_KG_BEYOND) {
        Some(rate) => checked(
            params::RATE_PER_KG_BEYOND,
            weight.checked_sub(threshold).and_then(|excess| excess.checked_mul(rate)),
        )?,
        None => Decimal::ZERO,
    };
    Ok(FactorEffect::Additive {
        amount: checked(params::SURCHARGE, surcharge.checked_add(beyond))?,
        detail: format!("{weight} kg at or above {threshold} kg threshold"),
    })
}

fn time_multiplier(
    factor: &PricingFactor,
    attributes: &RequestAttributes,
) -> Result<FactorEffect, FactorConfigError> {
    let peak = factor.parameter(params::PEAK_MULTIPLIER);
    let weekend = factor.parameter(params::WEEKEND_MULTIPLIER);
    if peak.is_none() && weekend.is_none() {
        return Err(FactorConfigError::MissingParameter(params::PEAK_MULTIPLIER));
    }

    let mut combined = Decimal::ONE;
    let mut reasons = Vec::new();
    if attributes.is_peak_hour == Some(true) {
        if let Some(multiplier) = peak {
            let multiplier = check_positive(params::PEAK_MULTIPLIER, multiplier)?;
            combined = checked(params::PEAK_MULTIPLIER, combined.checked_mul(multiplier))?;
            reasons.push("peak hour");
        }
    }
    if attributes.is_weekend == Some(true) {
        if let Some(multiplier) = weekend {
            let multiplier = check_positive(params::WEEKEND_MULTIPLIER, multiplier)?;
            combined = checked(params::WEEKEND_MULTIPLIER, combined.checked_mul(multiplier))?;
            reasons.push("weekend");
        }
    }

    if reasons.is_empty() {
        return Ok(FactorEffect::NotApplicable);
    }
    Ok(FactorEffect::Multiplier { factor: combined, detail: reasons.join(" + ") })
}

fn selector_match(
    factor: &PricingFactor,
    attribute: Option<&str>,
) -> Result<FactorEffect, FactorConfigError> {
    let selector = factor.selector.as_deref().ok_or(FactorConfigError::MissingSelector)?;
    match attribute {
        Some(value) if value.trim().eq_ignore_ascii_case(selector.trim()) => {
            flat_or_multiplier(factor, format!("{} = {selector}", factor.category))
        }
        _ => Ok(FactorEffect::NotApplicable),
    }
}

fn flat_or_multiplier(
    factor: &PricingFactor,
    detail: String,
) -> Result<FactorEffect, FactorConfigError> {
    if let Some(multiplier) = factor.parameter(params::MULTIPLIER) {
        let multiplier = check_positive(params::MULTIPLIER, multiplier)?;
        return Ok(FactorEffect::Multiplier { factor: multiplier, detail });
    }
    if let Some(amount) = factor.parameter(params::SURCHARGE) {
        return Ok(FactorEffect::Additive { amount, detail });
    }
    Err(FactorConfigError::NoEffect)
}

fn per_unit_beyond(
    factor: &PricingFactor,
    units: Decimal,
    rate_param: &'static str,
    included_param: &'static str,
    default_included: Decimal,
    unit_label: &str,
) -> Result<FactorEffect, FactorConfigError> {
    let rate = required(factor, rate_param)?;
    let included = factor.parameter(included_param).unwrap_or(default_included);
    let billable = checked(included_param, units.checked_sub(included))?.max(Decimal::ZERO);
    Ok(FactorEffect::Additive {
        amount: checked(rate_param, billable.checked_mul(rate))?,
        detail: format!("{billable} extra {unit_label} x {rate}"),
    })
}

fn checked(param: &'static str, value: Option<Decimal>) -> Result<Decimal, FactorConfigError> {
    value.ok_or(FactorConfigError::Overflow(param))
}

fn required(factor: &PricingFactor, param: &'static str) -> Result<Decimal, FactorConfigError> {
    factor.parameter(param).ok_or(FactorConfigError::MissingParameter(param))
}

fn positive(factor: &PricingFactor, param: &'static str) -> Result<Decimal, FactorConfigError> {
    check_positive(param, required(factor, param)?)
}

fn check_positive(param: &'static str, value: Decimal) -> Result<Decimal, FactorConfigError> {
    if value <= Decimal::ZERO {
        return Err(FactorConfigError::InvalidParameter {
            param,
            reason: format!("multiplier must be positive, got {value}"),
        });
    }
    Ok(value)
}
