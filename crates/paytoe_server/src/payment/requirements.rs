//! Builds the advertised payment requirement from configuration.

use super::types::{EXACT_SCHEME, PaymentRequired, PaymentRequirements, ResourceInfo, X402_VERSION};
use crate::config::{ConfigError, ServerConfig};
use tracing::{debug, instrument};

/// Seconds a signed authorization may wait before settlement.
pub const MAX_TIMEOUT_SECONDS: u64 = 300;

/// The single requirement this server advertises: one game, `exact` USDC.
#[instrument(skip(config), fields(network = %config.network(), price = %config.price_usdc()))]
pub fn build_payment_required(config: &ServerConfig) -> Result<PaymentRequired, ConfigError> {
    let amount = config.price_atomic().ok_or_else(|| {
        ConfigError::new(format!("Unusable price: {}", config.price_usdc()))
    })?;
    let network = *config.network();

    let requirement = PaymentRequirements {
        scheme: EXACT_SCHEME.to_string(),
        network: network.caip2(),
        amount: amount.to_string(),
        asset: network.usdc_address().to_string(),
        pay_to: config.pay_to().clone(),
        max_timeout_seconds: MAX_TIMEOUT_SECONDS,
        extra: Some(serde_json::json!({
            "name": network.usdc_domain_name(),
            "version": "2",
        })),
    };
    debug!(amount = %requirement.amount, asset = %requirement.asset, "Built payment requirement");

    Ok(PaymentRequired {
        x402_version: X402_VERSION,
        error: None,
        resource: ResourceInfo {
            url: config.resource_url().clone(),
            description: config.resource_description().clone(),
            mime_type: "application/json".to_string(),
        },
        accepts: vec![requirement],
    })
}
