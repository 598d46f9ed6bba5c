//! Client for the remote x402 facilitator.

use super::types::{
    FacilitatorRequest, PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind,
    SupportedResponse, VerifyResponse, X402_VERSION,
};
use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Verifies and settles payments on the server's behalf.
#[async_trait]
pub trait Facilitator: Send + Sync + std::fmt::Debug {
    /// Scheme/network pairs the facilitator handles.
    async fn supported(&self) -> Result<Vec<SupportedKind>, FacilitatorError>;

    /// Checks a payload without moving funds.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError>;

    /// Submits the transfer on chain.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;
}

/// Facilitator reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFacilitator {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFacilitator {
    /// Creates a client for `base_url`. Every call is bounded by `timeout`.
    #[instrument(skip(base_url), fields(base_url = %base_url.as_ref()))]
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, FacilitatorError> {
        info!(timeout_secs = timeout.as_secs(), "Creating facilitator client");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FacilitatorError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<T, FacilitatorError> {
        let exchange = async {
            let response = request.send().await.map_err(|e| {
                error!(endpoint, error = ?e, "Facilitator request failed");
                FacilitatorError::new(format!("Facilitator {} request failed: {}", endpoint, e))
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                FacilitatorError::new(format!("Failed to read facilitator response: {}", e))
            })?;

            if !status.is_success() {
                error!(endpoint, status = %status, response = %body, "Facilitator returned error");
                return Err(FacilitatorError::new(format!(
                    "Facilitator {} error {}: {}",
                    endpoint, status, body
                )));
            }

            serde_json::from_str(&body).map_err(|e| {
                error!(endpoint, error = ?e, response = %body, "Unparseable facilitator response");
                FacilitatorError::new(format!("Failed to parse facilitator {} response: {}", endpoint, e))
            })
        };

        // The client timeout covers the socket; this also bounds slow bodies.
        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                error!(endpoint, timeout_secs = self.timeout.as_secs(), "Facilitator timed out");
                FacilitatorError::new(format!("Facilitator {} timed out", endpoint))
            })?
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, FacilitatorError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "POST to facilitator");
        self.send(self.client.post(url).json(body), endpoint).await
    }
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    #[instrument(skip(self))]
    async fn supported(&self) -> Result<Vec<SupportedKind>, FacilitatorError> {
        let url = format!("{}/supported", self.base_url);
        debug!(url = %url, "GET facilitator capabilities");
        let response: SupportedResponse = self.send(self.client.get(url), "supported").await?;
        Ok(response.kinds)
    }

    #[instrument(skip_all, fields(payer = %payload.claimed_payer()))]
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        };
        let response: VerifyResponse = self.post("verify", &body).await?;
        debug!(is_valid = response.is_valid, "Verification answered");
        Ok(response)
    }

    #[instrument(skip_all, fields(payer = %payload.claimed_payer()))]
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload,
            payment_requirements: requirements,
        };
        let response: SettleResponse = self.post("settle", &body).await?;
        info!(
            success = response.success,
            transaction = %response.transaction,
            "Settlement answered"
        );
        Ok(response)
    }
}

/// Facilitator transport or protocol error.
#[derive(Debug, Clone, Display, Error)]
#[display("Facilitator error: {} at {}:{}", message, file, line)]
pub struct FacilitatorError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl FacilitatorError {
    /// Creates a new facilitator error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::types::{Eip3009Authorization, ExactEvmPayload};
    use std::time::Instant;
    use tokio::net::TcpListener;

    fn sample_requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "eip155:84532".to_string(),
            amount: "10000".to_string(),
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            pay_to: "0x3CB9B3bBfde8501f411bB69Ad3DC07908ED0dE20".to_string(),
            max_timeout_seconds: 300,
            extra: None,
        }
    }

    fn sample_payload(requirements: &PaymentRequirements) -> PaymentPayload {
        PaymentPayload {
            x402_version: X402_VERSION,
            resource: None,
            accepted: Some(requirements.clone()),
            scheme: None,
            network: None,
            payload: ExactEvmPayload {
                signature: "0xdeadbeef".to_string(),
                authorization: Eip3009Authorization {
                    from: "0x1111111111111111111111111111111111111111".to_string(),
                    to: requirements.pay_to.clone(),
                    value: requirements.amount.clone(),
                    valid_after: "0".to_string(),
                    valid_before: "4102444800".to_string(),
                    nonce: format!("0x{:064x}", 7),
                },
            },
            extensions: None,
        }
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let facilitator =
            HttpFacilitator::new("https://x402.org/facilitator/", Duration::from_secs(5)).unwrap();
        assert_eq!(facilitator.base_url(), "https://x402.org/facilitator");
    }

    #[tokio::test]
    async fn test_unreachable_facilitator_is_an_error() {
        // Port 9 (discard) on loopback is closed in test environments.
        let facilitator =
            HttpFacilitator::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = facilitator.supported().await.unwrap_err();
        assert!(err.message.contains("supported"));
    }

    #[tokio::test]
    async fn test_silent_facilitator_settle_times_out() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let facilitator =
            HttpFacilitator::new(format!("http://{}", addr), Duration::from_millis(300)).unwrap();
        let requirements = sample_requirements();
        let payload = sample_payload(&requirements);

        let started = Instant::now();
        let err = facilitator
            .settle(&payload, &requirements)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(err.message.contains("settle"), "{}", err.message);
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        server.abort();
    }

    #[test]
    fn test_error_records_location() {
        let err = FacilitatorError::new("boom".to_string());
        assert!(err.file.ends_with("facilitator.rs"));
        assert!(err.to_string().contains("boom"));
    }
}
