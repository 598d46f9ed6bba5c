//! Shared handler state.

use crate::payment::PaymentGate;
use crate::service::GameService;
use std::sync::Arc;

/// State cloned into every handler and the payment middleware.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Game operations.
    pub service: Arc<GameService>,
    /// Paywall for session start.
    pub gate: Arc<PaymentGate>,
}

impl AppState {
    /// Bundles the service and gate.
    pub fn new(service: GameService, gate: PaymentGate) -> Self {
        Self {
            service: Arc::new(service),
            gate: Arc::new(gate),
        }
    }
}
