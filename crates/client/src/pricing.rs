use movely_core::domain::pricing_factor::{FactorCategory, PricingFactor};
use movely_core::pricing::{decode_factors, FactorSourceError, PricingFactorSource};
use serde_json::Value;

use crate::api::{ApiClient, ClientError};

/// Reads administrator-authored factors from `GET /pricing-factors`.
#[derive(Clone, Debug)]
pub struct HttpPricingFactorSource {
    client: ApiClient,
}

impl HttpPricingFactorSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl From<ClientError> for FactorSourceError {
    fn from(value: ClientError) -> Self {
        match value {
            ClientError::Decode(reason) => Self::Decode(reason),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl PricingFactorSource for HttpPricingFactorSource {
    async fn active_factors(
        &self,
        category: Option<FactorCategory>,
    ) -> Result<Vec<PricingFactor>, FactorSourceError> {
        let query: Vec<(&str, &str)> =
            category.map(|category| ("category", category.as_str())).into_iter().collect();
        let entries: Vec<Value> = self.client.get_json(&["pricing-factors"], &query).await?;
        let total = entries.len();
        let factors = decode_factors(entries);

        let active: Vec<PricingFactor> = factors
            .into_iter()
            .filter(|factor| factor.active)
            .filter(|factor| category.map_or(true, |category| factor.category == category))
            .collect();
        if active.len() != total {
            tracing::debug!(
                event_name = "client.pricing_factors_filtered",
                dropped = total - active.len(),
                "ignoring factors that do not decode or do not apply"
            );
        }
        Ok(active)
    }
}
