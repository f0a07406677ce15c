use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::core::flows::FlowOutcome;
use crate::error::AppError;
use crate::observability::correlation::RequestContext;
use crate::state::AppState;
use crate::types::{MessageId, UserId};

/// The user's answer to a pay prompt
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayRequest {
    pub user_id: UserId,
    /// Prompt message the answer replies to
    pub prompt_message_id: MessageId,
    pub amount_msat: u64,
    /// The answer message itself
    pub message_id: MessageId,
}

pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(req): Json<ConfirmPayRequest>,
) -> Result<Json<FlowOutcome>, AppError> {
    info!(
        user_id = req.user_id,
        prompt_message_id = req.prompt_message_id,
        amount_msat = req.amount_msat,
        correlation_id = %context.correlation_id,
        "Confirming lnurl-pay"
    );

    let outcome = state
        .core
        .confirm_pay(
            req.user_id,
            req.prompt_message_id,
            req.amount_msat,
            req.message_id,
        )
        .await?;
    Ok(Json(outcome))
}
