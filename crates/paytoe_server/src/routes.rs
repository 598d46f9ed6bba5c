//! HTTP routes.

use crate::error::ApiError;
use crate::payment::{
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, PaidWallet,
    PaymentRequired, X_PAYMENT_HEADER, require_payment,
};
use crate::service::{MoveRequest, MoveResponse, SessionSnapshot, StartResponse};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, instrument, warn};

/// Liveness body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Server time.
    pub timestamp: DateTime<Utc>,
}

/// Builds the application router.
#[instrument(skip(state))]
pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    let paid = Router::new()
        .route("/session/start", post(start_session))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_payment));

    let api = Router::new()
        .merge(paid)
        .route("/session/{wallet_address}", get(get_session))
        .route("/game/move", post(make_move))
        .route("/payment-requirements", get(payment_requirements));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(PAYMENT_SIGNATURE_HEADER),
            HeaderName::from_static(X_PAYMENT_HEADER),
        ])
        .expose_headers([
            HeaderName::from_static(PAYMENT_REQUIRED_HEADER),
            HeaderName::from_static(PAYMENT_RESPONSE_HEADER),
        ])
}

#[instrument(skip_all)]
async fn start_session(
    State(state): State<AppState>,
    Extension(paid): Extension<PaidWallet>,
) -> Result<Json<StartResponse>, ApiError> {
    debug!(wallet = %paid.address(), restoring = paid.is_restoring(), "Start authorized");
    state.service.start(&paid).await.map(Json)
}

#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(wallet_address): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    state.service.get(&wallet_address).await.map(Json)
}

#[instrument(skip_all)]
async fn make_move(
    State(state): State<AppState>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<MoveResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "Malformed move body");
        ApiError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let (wallet, position) = request.into_parts()?;
    state.service.make_move(&wallet, position).await.map(Json)
}

async fn payment_requirements(State(state): State<AppState>) -> Json<PaymentRequired> {
    Json(state.gate.payment_required().clone())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}
