//! Supported settlement networks and USDC amount handling.

use serde::{Deserialize, Serialize};

/// Decimals of the USDC token on every supported network.
pub const USDC_DECIMALS: u32 = 6;

/// EVM networks the paywall can charge on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    /// Base mainnet.
    Base,
    /// Base Sepolia testnet.
    #[default]
    BaseSepolia,
}

impl Network {
    /// EIP-155 chain id.
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
        }
    }

    /// CAIP-2 identifier used by x402 v2 (`eip155:<chain id>`).
    pub fn caip2(self) -> String {
        format!("eip155:{}", self.chain_id())
    }

    /// USDC contract address on this network.
    pub fn usdc_address(self) -> &'static str {
        match self {
            Network::Base => "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            Network::BaseSepolia => "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        }
    }

    /// EIP-712 domain name of the USDC contract, needed by signers.
    pub fn usdc_domain_name(self) -> &'static str {
        match self {
            Network::Base => "USD Coin",
            Network::BaseSepolia => "USDC",
        }
    }

    /// Whether a network string from a payload names this network.
    ///
    /// Accepts both the CAIP-2 id and the legacy v1 name.
    pub fn matches(self, network: &str) -> bool {
        network.eq_ignore_ascii_case(&self.caip2()) || network.eq_ignore_ascii_case(&self.to_string())
    }
}

/// Checks for a `0x`-prefixed 20-byte hex address.
pub fn is_evm_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Converts a decimal USDC amount ("0.01") into atomic units ("10000").
///
/// Returns `None` for malformed input or more than six fractional digits.
pub fn usdc_to_atomic(amount: &str) -> Option<u128> {
    let amount = amount.trim().trim_start_matches('$');
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > USDC_DECIMALS as usize
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let scale = 10u128.pow(USDC_DECIMALS);
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let padded = format!("{:0<width$}", fraction, width = USDC_DECIMALS as usize);
    let fraction: u128 = padded.parse().ok()?;
    whole.checked_mul(scale)?.checked_add(fraction)
}
