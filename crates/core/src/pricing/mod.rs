//! Pricing factor engine.
//!
//! Multiplicative contributions compound onto the base price in factor list
//! order; additive contributions are summed and added once. Everything is
//! carried at full precision and only the final total is rounded.

pub mod attributes;
pub mod factors;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::pricing_factor::{FactorCategory, PricingFactor, PricingFactorId};
use crate::domain::request::ServiceRequest;

pub use attributes::RequestAttributes;
pub use factors::{evaluate, FactorConfigError, FactorEffect};

pub const DEFAULT_CURRENCY: &str = "GBP";
pub const QUOTE_DECIMAL_PLACES: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Additive,
    Multiplier,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorContribution {
    pub factor_id: PricingFactorId,
    pub category: FactorCategory,
    pub kind: ContributionKind,
    /// Surcharge amount, or the multiplier applied.
    pub amount: Decimal,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFactor {
    pub factor_id: PricingFactorId,
    pub category: FactorCategory,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub currency: String,
    pub base_price: Decimal,
    pub multiplier: Decimal,
    pub subtotal: Decimal,
    pub additive_total: Decimal,
    pub unrounded_total: Decimal,
    pub total: Decimal,
    pub contributions: Vec<FactorContribution>,
    pub skipped: Vec<SkippedFactor>,
}

pub trait PricingEngine: Send + Sync {
    fn quote(
        &self,
        base_price: Decimal,
        attributes: &RequestAttributes,
        factors: &[PricingFactor],
        currency: &str,
    ) -> PriceQuote;
}

#[derive(Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn quote(
        &self,
        base_price: Decimal,
        attributes: &RequestAttributes,
        factors: &[PricingFactor],
        currency: &str,
    ) -> PriceQuote {
        compute_quote_in(base_price, attributes, factors, currency)
    }
}

pub fn compute_quote(
    base_price: Decimal,
    attributes: &RequestAttributes,
    factors: &[PricingFactor],
) -> PriceQuote {
    compute_quote_in(base_price, attributes, factors, DEFAULT_CURRENCY)
}

pub fn compute_quote_in(
    base_price: Decimal,
    attributes: &RequestAttributes,
    factors: &[PricingFactor],
    currency: &str,
) -> PriceQuote {
    let mut subtotal = base_price;
    let mut multiplier = Decimal::ONE;
    let mut additive_total = Decimal::ZERO;
    let mut contributions = Vec::new();
    let mut skipped = Vec::new();

    for factor in factors.iter().filter(|factor| factor.active) {
        let effect = match evaluate(factor, attributes) {
            Ok(effect) => effect,
            Err(error) => {
                skip(&mut skipped, factor, error.to_string());
                continue;
            }
        };

        match effect {
            FactorEffect::NotApplicable => {}
            FactorEffect::Additive { amount, detail } => {
                let Some(next) = additive_total
                    .checked_add(amount)
                    .filter(|next| subtotal.checked_add(*next).is_some())
                else {
                    skip(&mut skipped, factor, "surcharge overflows the quote".to_owned());
                    continue;
                };
                additive_total = next;
                contributions.push(contribution(factor, ContributionKind::Additive, amount, detail));
            }
            FactorEffect::Multiplier { factor: value, detail } => {
                let next_subtotal = subtotal
                    .checked_mul(value)
                    .filter(|next| next.checked_add(additive_total).is_some());
                let (Some(next_subtotal), Some(next_multiplier)) =
                    (next_subtotal, multiplier.checked_mul(value))
                else {
                    skip(&mut skipped, factor, "multiplier overflows the quote".to_owned());
                    continue;
                };
                subtotal = next_subtotal;
                multiplier = next_multiplier;
                contributions.push(contribution(factor, ContributionKind::Multiplier, value, detail));
            }
        }
    }

    // Each accepted contribution keeps this sum representable.
    let unrounded_total = subtotal.saturating_add(additive_total);
    let total = unrounded_total
        .round_dp_with_strategy(QUOTE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);

    tracing::debug!(
        event_name = "pricing.quote_computed",
        base_price = %base_price,
        total = %total,
        applied = contributions.len(),
        skipped = skipped.len(),
        "computed price quote"
    );

    PriceQuote {
        currency: currency.to_string(),
        base_price,
        multiplier,
        subtotal,
        additive_total,
        unrounded_total,
        total,
        contributions,
        skipped,
    }
}

fn contribution(
    factor: &PricingFactor,
    kind: ContributionKind,
    amount: Decimal,
    detail: String,
) -> FactorContribution {
    FactorContribution {
        factor_id: factor.id.clone(),
        category: factor.category,
        kind,
        amount,
        detail,
    }
}

fn skip(skipped: &mut Vec<SkippedFactor>, factor: &PricingFactor, reason: String) {
    tracing::warn!(
        event_name = "pricing.factor_skipped",
        factor_id = %factor.id.0,
        category = %factor.category,
        reason = %reason,
        "skipping misconfigured pricing factor"
    );
    skipped.push(SkippedFactor { factor_id: factor.id.clone(), category: factor.category, reason });
}

/// Decodes factor definitions one entry at a time. An entry that does not
/// decode is logged and dropped; the rest are kept in order.
pub fn decode_factors(entries: Vec<serde_json::Value>) -> Vec<PricingFactor> {
    let mut factors = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let factor_id = entry
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<unknown>")
            .to_owned();
        match serde_json::from_value::<PricingFactor>(entry) {
            Ok(factor) => factors.push(factor),
            Err(error) => tracing::warn!(
                event_name = "pricing.factor_skipped",
                factor_id = %factor_id,
                index,
                reason = %error,
                "skipping undecodable pricing factor"
            ),
        }
    }
    factors
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FactorSourceError {
    #[error("pricing factors unavailable: {0}")]
    Unavailable(String),
    #[error("pricing factor payload could not be decoded: {0}")]
    Decode(String),
}

/// Read-only access to administrator-authored factors.
#[async_trait]
pub trait PricingFactorSource: Send + Sync {
    async fn active_factors(
        &self,
        category: Option<FactorCategory>,
    ) -> Result<Vec<PricingFactor>, FactorSourceError>;
}

#[derive(Clone, Debug, Default)]
pub struct StaticFactorSource {
    factors: Vec<PricingFactor>,
}

impl StaticFactorSource {
    pub fn new(factors: Vec<PricingFactor>) -> Self {
        Self { factors }
    }
}

#[async_trait]
impl PricingFactorSource for StaticFactorSource {
    async fn active_factors(
        &self,
        category: Option<FactorCategory>,
    ) -> Result<Vec<PricingFactor>, FactorSourceError> {
        Ok(self
            .factors
            .iter()
            .filter(|factor| factor.active)
            .filter(|factor| category.map_or(true, |category| factor.category == category))
            .cloned()
            .collect())
    }
}

/// Everything the form needs to quote a request at submit time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingContext {
    pub base_price: Decimal,
    pub currency: String,
    pub factors: Vec<PricingFactor>,
    /// Attributes the form cannot derive itself, such as distance or weather.
    pub supplied: RequestAttributes,
}

impl PricingContext {
    pub fn new(base_price: Decimal, currency: impl Into<String>, factors: Vec<PricingFactor>) -> Self {
        Self { base_price, currency: currency.into(), factors, supplied: RequestAttributes::default() }
    }

    pub fn with_supplied(mut self, supplied: RequestAttributes) -> Self {
        self.supplied = supplied;
        self
    }

    pub async fn from_source(
        source: &dyn PricingFactorSource,
        base_price: Decimal,
        currency: impl Into<String>,
    ) -> Result<Self, FactorSourceError> {
        let factors = source.active_factors(None).await?;
        Ok(Self::new(base_price, currency, factors))
    }

    pub fn quote(&self, request: &ServiceRequest) -> PriceQuote {
        let attributes = RequestAttributes::from_request(request).merged_with(&self.supplied);
        DeterministicPricingEngine.quote(self.base_price, &attributes, &self.factors, &self.currency)
    }
}
