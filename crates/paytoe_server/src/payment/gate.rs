//! The paywall in front of session start.
//!
//! Order of operations for a request carrying a payment:
//!
//! 1. decode the header and check scheme/network against the requirement
//! 2. verify with the facilitator (no lock held)
//! 3. take the payer's wallet lock
//! 4. a live session means a restore: no settlement, nothing charged
//! 5. otherwise settle; only a successful settlement lets the request through
//!
//! The wallet lock travels with [`PaidWallet`] so the start handler runs
//! inside the same critical section as the existence check and settlement.

use super::facilitator::{Facilitator, FacilitatorError};
use super::network::{Network, is_evm_address};
use super::requirements::build_payment_required;
use super::types::{
    EXACT_SCHEME, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
    PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo, SettleResponse,
    X_PAYMENT_HEADER, encode_header,
};
use crate::config::{ConfigError, ServerConfig};
use crate::error::ApiError;
use crate::session::{Session, SessionStore, WalletGuard, WalletLocks};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Largest start body buffered while looking for a wallet hint.
const MAX_START_BODY: usize = 16 * 1024;

/// A wallet that got past the paywall.
///
/// Only the gate constructs these. Clones share the wallet lock, which is
/// released once the last clone drops.
#[derive(Debug, Clone)]
pub struct PaidWallet {
    address: String,
    restoring: bool,
    settlement: Option<SettleResponse>,
    lock: Arc<WalletGuard>,
}

impl PaidWallet {
    pub(crate) fn new(guard: WalletGuard, restoring: bool, settlement: Option<SettleResponse>) -> Self {
        Self {
            address: guard.wallet().to_string(),
            restoring,
            settlement,
            lock: Arc::new(guard),
        }
    }

    /// Verified, normalized payer address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the wallet already had a live session and was not charged.
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// Settlement receipt, present only when money moved.
    pub fn settlement(&self) -> Option<&SettleResponse> {
        self.settlement.as_ref()
    }
}

/// A 402 carrying the payment requirement.
#[derive(Debug)]
pub struct PaymentChallenge {
    reason: ApiError,
    required: PaymentRequired,
    has_existing_session: bool,
    session_expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeBody<'a> {
    error: &'static str,
    message: String,
    x402_version: u32,
    resource: &'a ResourceInfo,
    accepts: &'a [PaymentRequirements],
    has_existing_session: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_expires_at: Option<DateTime<Utc>>,
}

impl IntoResponse for PaymentChallenge {
    fn into_response(self) -> Response {
        let body = ChallengeBody {
            error: self.reason.kind(),
            message: self.reason.to_string(),
            x402_version: self.required.x402_version,
            resource: &self.required.resource,
            accepts: &self.required.accepts,
            has_existing_session: self.has_existing_session,
            session_expires_at: self.session_expires_at,
        };
        let mut response = (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();

        match encode_header(&self.required).map(HeaderValue::try_from) {
            Ok(Ok(value)) => {
                response.headers_mut().insert(PAYMENT_REQUIRED_HEADER, value);
            }
            Ok(Err(e)) => error!(error = %e, "Payment requirement is not a valid header"),
            Err(e) => error!(error = %e, "Failed to encode payment requirement"),
        }
        response
    }
}

/// Why the gate refused a request.
#[derive(Debug)]
pub enum GateRejection {
    /// Pay (again) to proceed.
    Challenge(PaymentChallenge),
    /// Payment was verified but could not be charged.
    Failed(ApiError),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Challenge(challenge) => challenge.into_response(),
            GateRejection::Failed(err) => err.into_response(),
        }
    }
}

/// Startup failure of the gate.
#[derive(Debug, Display, Error, From)]
pub enum GateInitError {
    /// Requirement could not be built.
    #[display("{_0}")]
    Config(ConfigError),
    /// Facilitator could not be queried.
    #[display("{_0}")]
    Facilitator(FacilitatorError),
}

/// Payment verifier and settler for paid routes.
#[derive(Debug, Clone)]
pub struct PaymentGate {
    required: Arc<PaymentRequired>,
    network: Network,
    facilitator: Arc<dyn Facilitator>,
}

impl PaymentGate {
    /// Builds the gate without contacting the facilitator.
    #[instrument(skip_all)]
    pub fn new(config: &ServerConfig, facilitator: Arc<dyn Facilitator>) -> Result<Self, ConfigError> {
        Ok(Self {
            required: Arc::new(build_payment_required(config)?),
            network: *config.network(),
            facilitator,
        })
    }

    /// Builds the gate and confirms the facilitator is reachable.
    ///
    /// An unreachable facilitator aborts startup. A facilitator that does
    /// not list our scheme/network only produces a warning, since some
    /// deployments omit kinds they still accept.
    #[instrument(skip_all, fields(network = %config.network()))]
    pub async fn initialize(
        config: &ServerConfig,
        facilitator: Arc<dyn Facilitator>,
    ) -> Result<Self, GateInitError> {
        let gate = Self::new(config, facilitator)?;
        let kinds = gate.facilitator.supported().await?;
        let supported = kinds
            .iter()
            .any(|k| k.scheme == EXACT_SCHEME && gate.network.matches(&k.network));
        if supported {
            info!(kinds = kinds.len(), "Facilitator supports our payment kind");
        } else {
            warn!(
                kinds = kinds.len(),
                network = %gate.network,
                "Facilitator does not list exact USDC on our network"
            );
        }
        Ok(gate)
    }

    /// The advertised requirement.
    pub fn payment_required(&self) -> &PaymentRequired {
        &self.required
    }

    fn requirement(&self) -> Result<&PaymentRequirements, GateRejection> {
        self.required.accepts.first().ok_or_else(|| {
            GateRejection::Failed(ApiError::Internal("No payment requirement configured".into()))
        })
    }

    fn challenge(&self, reason: ApiError, existing: Option<&Session>) -> GateRejection {
        GateRejection::Challenge(PaymentChallenge {
            required: self.required.with_error(reason.to_string()),
            reason,
            has_existing_session: existing.is_some(),
            session_expires_at: existing.map(|s| s.expires_at),
        })
    }

    fn invalid(&self, message: impl Into<String>) -> GateRejection {
        self.challenge(ApiError::InvalidPayment(message.into()), None)
    }

    fn matches_requirement(&self, payload: &PaymentPayload) -> bool {
        payload.scheme() == Some(EXACT_SCHEME)
            && payload.network().is_some_and(|n| self.network.matches(n))
    }

    /// Runs the paywall for one request.
    ///
    /// `artifact` is the raw payment header. `hint` is an unverified wallet
    /// from the request body, used only to tell an unpaid client whether a
    /// session is waiting for it.
    #[instrument(skip_all, fields(has_payment = artifact.is_some()))]
    pub async fn authorize(
        &self,
        artifact: Option<&str>,
        hint: Option<&str>,
        store: &dyn SessionStore,
        locks: &WalletLocks,
    ) -> Result<PaidWallet, GateRejection> {
        let Some(artifact) = artifact else {
            let existing = match hint {
                Some(wallet) => store.get(wallet).await.filter(|s| !s.status.is_terminal()),
                None => None,
            };
            debug!(
                hint = ?hint,
                has_existing_session = existing.is_some(),
                "No payment attached"
            );
            return Err(self.challenge(
                ApiError::PaymentRequired(
                    "Payment required. Sign a payment to start a game or restore your session."
                        .into(),
                ),
                existing.as_ref(),
            ));
        };

        let payload = PaymentPayload::decode(artifact).map_err(|reason| {
            warn!(reason = %reason, "Undecodable payment header");
            self.invalid(reason)
        })?;
        let requirement = self.requirement()?;

        if !self.matches_requirement(&payload) {
            warn!(scheme = ?payload.scheme(), network = ?payload.network(), "Payment kind mismatch");
            return Err(self.invalid(format!(
                "Payment must use scheme {} on {}",
                EXACT_SCHEME,
                self.network.caip2()
            )));
        }

        let verdict = self
            .facilitator
            .verify(&payload, requirement)
            .await
            .map_err(|e| {
                warn!(error = %e, "Verification unavailable");
                self.invalid(format!("Payment verification failed: {}", e.message))
            })?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "payment rejected by facilitator".to_string());
            warn!(reason = %reason, "Payment rejected");
            return Err(self.invalid(format!("Payment verification failed: {}", reason)));
        }

        let payer = verdict
            .payer
            .as_deref()
            .unwrap_or_else(|| payload.claimed_payer());
        if !is_evm_address(payer) {
            warn!(payer, "Verified payer is not an address");
            return Err(self.invalid(format!("Payer is not a valid address: {}", payer)));
        }

        let guard = locks.acquire(payer).await;
        let live = store
            .get(guard.wallet())
            .await
            .filter(|s| !s.status.is_terminal());
        if let Some(session) = live {
            info!(
                wallet = %session.wallet_address,
                expires_at = %session.expires_at,
                "Live session found, restoring without charge"
            );
            return Ok(PaidWallet::new(guard, true, None));
        }

        let settlement = self
            .facilitator
            .settle(&payload, requirement)
            .await
            .map_err(|e| {
                error!(wallet = %guard.wallet(), error = %e, "Settlement unavailable");
                GateRejection::Failed(ApiError::Settlement(format!(
                    "Payment settlement failed: {}",
                    e.message
                )))
            })?;
        if !settlement.success {
            let reason = settlement
                .error_reason
                .clone()
                .unwrap_or_else(|| "unknown reason".to_string());
            error!(wallet = %guard.wallet(), reason = %reason, "Settlement refused");
            return Err(GateRejection::Failed(ApiError::Settlement(format!(
                "Payment settlement failed: {}",
                reason
            ))));
        }

        info!(
            wallet = %guard.wallet(),
            transaction = %settlement.transaction,
            "Payment settled"
        );
        Ok(PaidWallet::new(guard, false, Some(settlement)))
    }
}

/// Reads the payment header, preferring the v2 name.
pub fn payment_header(headers: &HeaderMap) -> Option<String> {
    [PAYMENT_SIGNATURE_HEADER, X_PAYMENT_HEADER]
        .into_iter()
        .find_map(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartHint {
    #[serde(default)]
    wallet_address: Option<String>,
}

/// Pulls an unverified `walletAddress` out of a JSON body, if any.
pub fn wallet_hint(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<StartHint>(body)
        .ok()?
        .wallet_address
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
}

/// Axum middleware guarding the start route.
///
/// Inserts a [`PaidWallet`] extension for the handler and, after a fresh
/// settlement, echoes the receipt in `PAYMENT-RESPONSE`.
pub async fn require_payment(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_START_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Unreadable start body");
            return ApiError::Validation("Request body is too large or unreadable".into())
                .into_response();
        }
    };
    let artifact = payment_header(&parts.headers);
    let hint = wallet_hint(&bytes);

    let paid = match state
        .gate
        .authorize(
            artifact.as_deref(),
            hint.as_deref(),
            state.service.store().as_ref(),
            state.service.locks(),
        )
        .await
    {
        Ok(paid) => paid,
        Err(rejection) => return rejection.into_response(),
    };

    let settlement = paid.settlement.clone();
    let held = Arc::clone(&paid.lock);
    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(paid);

    let mut response = next.run(request).await;
    drop(held);

    if let Some(settlement) = settlement
        && response.status().is_success()
    {
        match encode_header(&settlement).map(HeaderValue::try_from) {
            Ok(Ok(value)) => {
                response.headers_mut().insert(PAYMENT_RESPONSE_HEADER, value);
            }
            _ => error!("Failed to encode settlement receipt"),
        }
    }
    response
}
