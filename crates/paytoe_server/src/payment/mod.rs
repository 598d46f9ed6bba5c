//! x402 paywall: wire types, facilitator client and the request gate.

mod facilitator;
mod gate;
mod network;
mod requirements;
mod types;

pub use facilitator::{Facilitator, FacilitatorError, HttpFacilitator};
pub use gate::{
    GateInitError, GateRejection, PaidWallet, PaymentChallenge, PaymentGate, payment_header,
    require_payment, wallet_hint,
};
pub use network::{Network, USDC_DECIMALS, is_evm_address, usdc_to_atomic};
pub use requirements::{MAX_TIMEOUT_SECONDS, build_payment_required};
pub use types::{
    EXACT_SCHEME, Eip3009Authorization, ExactEvmPayload, FacilitatorRequest,
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, PaymentPayload,
    PaymentRequired, PaymentRequirements, ResourceInfo, SettleResponse, SupportedKind,
    SupportedResponse, VerifyResponse, X_PAYMENT_HEADER, X402_VERSION, decode_header,
    encode_header,
};
