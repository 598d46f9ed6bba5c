//! HTTP-facing error taxonomy.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use derive_more::{Display, Error};
use derive_new::new;
use paytoe_tictactoe::MoveError;
use serde::Serialize;
use tracing::warn;

/// Every failure a client can observe, with its HTTP mapping.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ApiError {
    /// Bad input shape or range (400).
    #[display("{_0}")]
    Validation(#[error(not(source))] String),

    /// No live session for the wallet (404). Expired sessions land here too.
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),

    /// No payment artifact, or the session to restore vanished (402).
    #[display("{_0}")]
    PaymentRequired(#[error(not(source))] String),

    /// Undecodable or rejected payment artifact (402).
    #[display("{_0}")]
    InvalidPayment(#[error(not(source))] String),

    /// Verified payment could not be charged (500). No session was touched.
    #[display("{_0}")]
    Settlement(#[error(not(source))] String),

    /// Move on a finished game (400).
    #[display("This game has already ended. Please start a new game.")]
    GameOver,

    /// Anything else (500).
    #[display("{_0}")]
    Internal(#[error(not(source))] String),
}

impl ApiError {
    /// Machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::PaymentRequired(_) => "payment_required",
            ApiError::InvalidPayment(_) => "invalid_payment",
            ApiError::Settlement(_) => "settlement_failed",
            ApiError::GameOver => "game_over",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::GameOver => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PaymentRequired(_) | ApiError::InvalidPayment(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
            ApiError::Settlement(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MoveError> for ApiError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::GameOver => ApiError::GameOver,
            other => ApiError::Validation(format!(
                "Invalid move: {}. Cell is already occupied or position is out of range",
                other
            )),
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize, new)]
pub struct ErrorBody {
    /// Machine-readable kind.
    pub error: &'static str,
    /// Human message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.kind(), error = %self, "Request failed");
        }
        let body = Json(ErrorBody::new(self.kind(), self.to_string()));
        (status, body).into_response()
    }
}
