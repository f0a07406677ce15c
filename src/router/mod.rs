//! REST surface of the daemon.
//!
//! - `/v1/lnurl/handle`: run the handshake of an LNURL, lightning address or
//!   LNURL URL.
//! - `/v1/lnurl/scan`: find an LNURL in a chat message or QR payload and
//!   handle it.
//! - `/v1/lnurl/pay/confirm`: resume a pay prompt with the amount the user
//!   answered.
//! - `/v1/payments/resolve`: completion hook of the payment engine, hands the
//!   preimage to every waiter of the payment hash.
//! - `/v1/ledger/check`: run the clearing-account check.
//! - `/v1/rate/usd`: dollar estimate of an amount.
//!
//! `/health` and `/health/live` stay outside basic auth.

pub mod handlers;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use self::handlers::{ledger, lnurl, payments, rate};
use crate::auth::{basic_auth_middleware, BasicAuth};
use crate::health::{health_check, liveness_check};
use crate::observability::request_id_middleware;
use crate::state::AppState;

pub fn v1_routes() -> Router<AppState> {
    let lnurl_router = Router::new()
        .route("/handle", post(lnurl::handle::handle_rest))
        .route("/scan", post(lnurl::scan::handle_rest))
        .route("/pay/confirm", post(lnurl::confirm::handle_rest));

    Router::new()
        .nest("/lnurl", lnurl_router)
        .route("/payments/resolve", post(payments::resolve::handle_rest))
        .route("/ledger/check", get(ledger::check::handle_rest))
        .route("/rate/usd", get(rate::usd::handle_rest))
}

/// All routes with authentication and request ids applied. Transport layers
/// (CORS, tracing, metrics) are added by the binary.
pub fn build_router(state: AppState, auth: Arc<BasicAuth>) -> Router {
    let mut v1 = v1_routes();
    if auth.is_enabled() {
        v1 = v1.route_layer(middleware::from_fn(move |request, next| {
            basic_auth_middleware(auth.clone(), request, next)
        }));
    }

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(health_check))
        .route("/health/live", get(liveness_check))
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware))
}
