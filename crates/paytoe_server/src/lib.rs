//! Pay-per-play tic-tac-toe over HTTP.
//!
//! A wallet pays once through the x402 protocol and receives a game
//! session keyed by its address. Paying again while the session lives
//! restores it without a second charge. Sessions end when the game does
//! or after their time-to-live.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod payment;
pub mod routes;
pub mod service;
pub mod session;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use service::{GameService, MoveRequest, MoveResponse, SessionSnapshot, StartResponse};
pub use state::AppState;

use axum::Router;
use paytoe_tictactoe::OpponentStrategy;
use payment::PaymentGate;
use session::{SessionStore, WalletLocks};
use std::sync::Arc;

/// Wires service, gate and router from configuration.
///
/// The gate is built without contacting the facilitator; use
/// [`PaymentGate::initialize`] first when a reachability check is wanted.
pub fn build_app(
    config: &ServerConfig,
    store: Arc<dyn SessionStore>,
    locks: WalletLocks,
    gate: PaymentGate,
) -> Router {
    let service = GameService::new(
        store,
        locks,
        OpponentStrategy::new(*config.optimal_move_probability()),
    );
    create_router(AppState::new(service, gate), config.allowed_origins())
}

