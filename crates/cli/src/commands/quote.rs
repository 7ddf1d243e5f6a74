use std::path::Path;

use movely_client::{ApiClient, HttpPricingFactorSource};
use movely_core::domain::pricing_factor::PricingFactor;
use movely_core::pricing::{
    compute_quote_in, decode_factors, PricingFactorSource, RequestAttributes,
};
use rust_decimal::Decimal;

use crate::commands::{exit, load_config, read_json, runtime, CommandResult};

pub struct QuoteArgs<'a> {
    pub attributes: &'a Path,
    /// Local factor definitions; fetched from the API when absent.
    pub factors: Option<&'a Path>,
    pub base_price: Option<Decimal>,
}

pub fn run(args: QuoteArgs<'_>) -> CommandResult {
    let config = match load_config("quote") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let attributes: RequestAttributes = match read_json(args.attributes) {
        Ok(attributes) => attributes,
        Err(error) => {
            return CommandResult::failure("quote", "input", format!("{error:#}"), exit::INPUT)
        }
    };

    let factors = match args.factors {
        Some(path) => match read_json::<Vec<serde_json::Value>>(path) {
            Ok(entries) => decode_factors(entries),
            Err(error) => {
                return CommandResult::failure("quote", "input", format!("{error:#}"), exit::INPUT)
            }
        },
        None => match fetch_factors(&config.api) {
            Ok(factors) => factors,
            Err(failure) => return failure,
        },
    };

    let base_price = args.base_price.unwrap_or(config.pricing.base_price);
    if base_price.is_sign_negative() {
        return CommandResult::failure(
            "quote",
            "input",
            "base price must not be negative",
            exit::INPUT,
        );
    }

    let quote = compute_quote_in(base_price, &attributes, &factors, &config.pricing.currency);
    let message = format!("{:.2} {}", quote.total, quote.currency);
    match serde_json::to_value(&quote) {
        Ok(data) => CommandResult::success_with_data("quote", message, Some(data)),
        Err(error) => CommandResult::success("quote", format!("{message} (detail unavailable: {error})")),
    }
}

fn fetch_factors(
    api: &movely_core::config::ApiConfig,
) -> Result<Vec<PricingFactor>, CommandResult> {
    let client = ApiClient::from_config(api).map_err(|error| {
        CommandResult::failure("quote", "config_validation", error.to_string(), exit::CONFIG)
    })?;
    let source = HttpPricingFactorSource::new(client);

    runtime("quote")?.block_on(source.active_factors(None)).map_err(|error| {
        CommandResult::failure(
            "quote",
            "pricing_factors",
            format!("could not fetch pricing factors: {error}"),
            exit::INTEGRATION,
        )
    })
}
