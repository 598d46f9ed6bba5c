//! Shared harness for HTTP-level tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use paytoe_server::payment::{
    Eip3009Authorization, ExactEvmPayload, Facilitator, FacilitatorError, PaymentGate,
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind, VerifyResponse,
    encode_header,
};
use paytoe_server::session::{InMemorySessionStore, ManualClock, SessionStore, WalletLocks};
use paytoe_server::{AppState, GameService, ServerConfig, create_router};
use paytoe_tictactoe::OpponentStrategy;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

pub const PAY_TO: &str = "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20";
pub const WALLET: &str = "0xAbCdEf0000000000000000000000000000000001";
pub const OTHER_WALLET: &str = "0x2222222222222222222222222222222222222222";

/// Facilitator double that counts calls.
#[derive(Debug, Default)]
pub struct MockFacilitator {
    pub verify_calls: AtomicUsize,
    pub settle_calls: AtomicUsize,
    reject_reason: Option<String>,
    settle_failure: Option<String>,
    settle_erroring: bool,
    payer_override: Option<String>,
    settle_delay: Duration,
}

impl MockFacilitator {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_settlement(reason: &str) -> Self {
        Self {
            settle_failure: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn erroring_settlement() -> Self {
        Self {
            settle_erroring: true,
            ..Self::default()
        }
    }

    pub fn with_payer(mut self, payer: &str) -> Self {
        self.payer_override = Some(payer.to_string());
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn verifies(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn settles(&self) -> usize {
        self.settle_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Facilitator for MockFacilitator {
    async fn supported(&self) -> Result<Vec<SupportedKind>, FacilitatorError> {
        Ok(vec![SupportedKind {
            x402_version: 2,
            scheme: "exact".to_string(),
            network: "eip155:84532".to_string(),
        }])
    }

    async fn verify(
        &self,
        payload: &PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.reject_reason {
            Some(reason) => VerifyResponse {
                is_valid: false,
                invalid_reason: Some(reason.clone()),
                payer: None,
            },
            None => VerifyResponse {
                is_valid: true,
                invalid_reason: None,
                payer: Some(
                    self.payer_override
                        .clone()
                        .unwrap_or_else(|| payload.claimed_payer().to_string()),
                ),
            },
        })
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.settle_calls.fetch_add(1, Ordering::SeqCst);
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        if self.settle_erroring {
            return Err(FacilitatorError::new("Facilitator settle request failed: connection reset".to_string()));
        }
        Ok(match &self.settle_failure {
            Some(reason) => SettleResponse {
                success: false,
                error_reason: Some(reason.clone()),
                payer: None,
                transaction: String::new(),
                network: requirements.network.clone(),
            },
            None => SettleResponse {
                success: true,
                error_reason: None,
                payer: Some(payload.claimed_payer().to_string()),
                transaction: "0xfeedface".to_string(),
                network: requirements.network.clone(),
            },
        })
    }
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config
        .apply_overrides(|key| (key == "PAYMENT_ADDRESS").then(|| PAY_TO.to_string()))
        .unwrap();
    config.validate().unwrap();
    config
}

/// In-process server with a mock facilitator and a hand-driven clock.
pub struct TestApp {
    pub router: Router,
    pub facilitator: Arc<MockFacilitator>,
    pub clock: ManualClock,
    pub store: Arc<dyn SessionStore>,
    pub gate: Arc<PaymentGate>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new(facilitator: MockFacilitator) -> Self {
        Self::with_opponent(facilitator, OpponentStrategy::default())
    }

    pub fn with_opponent(facilitator: MockFacilitator, opponent: OpponentStrategy) -> Self {
        let config = test_config();
        let clock = ManualClock::default();
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::with_clock(
            config.session_ttl(),
            Arc::new(clock.clone()),
        ));
        let facilitator = Arc::new(facilitator);
        let gate = PaymentGate::new(&config, facilitator.clone()).unwrap();
        let service = GameService::with_seed(Arc::clone(&store), WalletLocks::new(), opponent, 42);
        let state = AppState::new(service, gate);
        let gate = Arc::clone(&state.gate);
        let router = create_router(state, config.allowed_origins());
        Self {
            router,
            facilitator,
            clock,
            store,
            gate,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// A well-formed payment header signed (nominally) by `wallet`.
    pub fn payment_for(&self, wallet: &str) -> String {
        let requirement = self.gate.payment_required().accepts[0].clone();
        let payload = PaymentPayload {
            x402_version: 2,
            resource: Some(self.gate.payment_required().resource.clone()),
            accepted: Some(requirement.clone()),
            scheme: None,
            network: None,
            payload: ExactEvmPayload {
                signature: "0xdeadbeef".to_string(),
                authorization: Eip3009Authorization {
                    from: wallet.to_string(),
                    to: requirement.pay_to.clone(),
                    value: requirement.amount.clone(),
                    valid_after: "0".to_string(),
                    valid_before: "4102444800".to_string(),
                    nonce: format!("0x{:064x}", 1),
                },
            },
            extensions: None,
        };
        encode_header(&payload).unwrap()
    }

    pub async fn start(&self, payment: Option<&str>, hint: Option<&str>) -> TestResponse {
        let mut builder = Request::post("/api/session/start").header("content-type", "application/json");
        if let Some(payment) = payment {
            builder = builder.header("PAYMENT-SIGNATURE", payment);
        }
        let body = match hint {
            Some(wallet) => serde_json::json!({ "walletAddress": wallet }).to_string(),
            None => String::new(),
        };
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    pub async fn start_paid(&self, wallet: &str) -> TestResponse {
        let payment = self.payment_for(wallet);
        self.start(Some(&payment), Some(wallet)).await
    }

    pub async fn get_session(&self, wallet: &str) -> TestResponse {
        self.send(
            Request::get(format!("/api/session/{}", wallet))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_move_raw(&self, body: String) -> TestResponse {
        self.send(
            Request::post("/api/game/move")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn make_move(&self, wallet: &str, position: i64) -> TestResponse {
        self.post_move_raw(
            serde_json::json!({ "walletAddress": wallet, "position": position }).to_string(),
        )
        .await
    }
}

/// Index of the first empty square in a JSON board.
pub fn first_empty(board: &Value) -> Option<i64> {
    board
        .as_array()?
        .iter()
        .position(Value::is_null)
        .map(|i| i as i64)
}

pub fn is_terminal(status: &Value) -> bool {
    matches!(status.as_str(), Some("player_wins" | "ai_wins" | "draw"))
}
