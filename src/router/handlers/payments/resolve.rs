use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Completion notice from the payment engine
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePaymentRequest {
    pub payment_hash: String,
    pub preimage: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePaymentResponse {
    /// Waiters that received the preimage
    pub delivered: usize,
}

pub async fn handle_rest(
    State(state): State<AppState>,
    Json(req): Json<ResolvePaymentRequest>,
) -> Result<Json<ResolvePaymentResponse>, AppError> {
    let delivered = state
        .core
        .resolve_payment(req.payment_hash.trim(), req.preimage.trim())?;
    Ok(Json(ResolvePaymentResponse { delivered }))
}
