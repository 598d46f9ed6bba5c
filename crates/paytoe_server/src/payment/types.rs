//! x402 wire types.
//!
//! Requirements and payloads travel base64-encoded JSON in HTTP headers;
//! facilitator calls carry them as plain JSON.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Protocol version this server speaks.
pub const X402_VERSION: u32 = 2;

/// The only scheme offered: a fixed-amount EIP-3009 transfer.
pub const EXACT_SCHEME: &str = "exact";

/// Inbound payment header (x402 v2).
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";
/// Inbound payment header (x402 v1), still accepted.
pub const X_PAYMENT_HEADER: &str = "x-payment";
/// Outbound header on 402 responses.
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";
/// Outbound header after a settlement.
pub const PAYMENT_RESPONSE_HEADER: &str = "payment-response";

/// One acceptable way to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, always `exact` here.
    pub scheme: String,
    /// CAIP-2 network id.
    pub network: String,
    /// Price in the asset's atomic units.
    pub amount: String,
    /// Token contract address.
    pub asset: String,
    /// Recipient wallet.
    pub pay_to: String,
    /// How long a signed authorization stays usable.
    pub max_timeout_seconds: u64,
    /// Scheme-specific data (the token's EIP-712 domain).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// What is being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Resource URL.
    pub url: String,
    /// Human description.
    pub description: String,
    /// Response content type.
    pub mime_type: String,
}

/// Body of the `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version.
    pub x402_version: u32,
    /// Why the previous attempt was refused, if there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The paid resource.
    pub resource: ResourceInfo,
    /// Acceptable payment options.
    pub accepts: Vec<PaymentRequirements>,
}

impl PaymentRequired {
    /// Copy carrying a refusal reason.
    pub fn with_error(&self, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..self.clone()
        }
    }
}

/// EIP-3009 `transferWithAuthorization` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    /// Claimed signer; untrusted until verified.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Amount in atomic units.
    pub value: String,
    /// Unix seconds.
    pub valid_after: String,
    /// Unix seconds.
    pub valid_before: String,
    /// 32-byte hex nonce.
    pub nonce: String,
}

/// Signed authorization for the `exact` EVM scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactEvmPayload {
    /// EIP-712 signature over the authorization.
    pub signature: String,
    /// The signed transfer.
    pub authorization: Eip3009Authorization,
}

/// Body of the inbound payment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version the client used.
    pub x402_version: u32,
    /// Resource the client believes it is paying for (v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,
    /// Requirement the client accepted (v2).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<PaymentRequirements>,
    /// Scheme (v1 top-level field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Network (v1 top-level field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// The signed authorization.
    pub payload: ExactEvmPayload,
    /// Protocol extensions, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl PaymentPayload {
    /// Decodes a header value.
    pub fn decode(header: &str) -> Result<Self, String> {
        decode_header(header)
    }

    /// Scheme the client paid with.
    pub fn scheme(&self) -> Option<&str> {
        self.accepted
            .as_ref()
            .map(|a| a.scheme.as_str())
            .or(self.scheme.as_deref())
    }

    /// Network the client paid on.
    pub fn network(&self) -> Option<&str> {
        self.accepted
            .as_ref()
            .map(|a| a.network.as_str())
            .or(self.network.as_deref())
    }

    /// Signer the client claims. Only meaningful after verification.
    pub fn claimed_payer(&self) -> &str {
        &self.payload.authorization.from
    }
}

/// Facilitator `/verify` and `/settle` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest<'a> {
    /// Protocol version.
    pub x402_version: u32,
    /// Client payload.
    pub payment_payload: &'a PaymentPayload,
    /// Requirement the payload must satisfy.
    pub payment_requirements: &'a PaymentRequirements,
}

/// Facilitator `/verify` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the signature and authorization check out.
    pub is_valid: bool,
    /// Reason when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Verified signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Facilitator `/settle` response; echoed to clients in `PAYMENT-RESPONSE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether the transfer landed.
    pub success: bool,
    /// Reason when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Charged wallet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Transaction hash.
    #[serde(default)]
    pub transaction: String,
    /// Network the transfer landed on.
    #[serde(default)]
    pub network: String,
}

/// One scheme/network pair a facilitator can handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version.
    pub x402_version: u32,
    /// Scheme name.
    pub scheme: String,
    /// Network id.
    pub network: String,
}

/// Facilitator `/supported` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedResponse {
    /// Supported kinds.
    #[serde(default)]
    pub kinds: Vec<SupportedKind>,
}

/// Encodes a value as base64 JSON for a header.
pub fn encode_header<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(STANDARD.encode(serde_json::to_vec(value)?))
}

/// Decodes a base64 JSON header, accepting standard or URL-safe alphabets.
pub fn decode_header<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let raw = raw.trim();
    let bytes = STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE.decode(raw))
        .map_err(|e| format!("payment header is not valid base64: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("payment header is not a valid payload: {e}"))
}
