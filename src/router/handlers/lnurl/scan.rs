use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use crate::core::flows::FlowOutcome;
use crate::error::AppError;
use crate::observability::correlation::RequestContext;
use crate::state::AppState;
use crate::types::{HandleLnurlOpts, UserId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub user_id: UserId,
    /// Chat message text or decoded QR payload
    pub text: String,
    #[serde(default)]
    pub from_qr: bool,
    #[serde(flatten)]
    pub opts: HandleLnurlOpts,
}

pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<FlowOutcome>, AppError> {
    debug!(
        user_id = req.user_id,
        from_qr = req.from_qr,
        correlation_id = %context.correlation_id,
        "Scanning text for lnurl"
    );

    let outcome = state
        .core
        .handle_text(req.user_id, &req.text, req.from_qr, req.opts)
        .await?;
    Ok(Json(outcome))
}
