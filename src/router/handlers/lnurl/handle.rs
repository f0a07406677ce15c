use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::core::flows::FlowOutcome;
use crate::error::AppError;
use crate::observability::correlation::RequestContext;
use crate::state::AppState;
use crate::types::{HandleLnurlOpts, UserId};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleLnurlRequest {
    pub user_id: UserId,
    /// Bech32 LNURL, lightning address or LNURL URL
    pub text: String,
    #[serde(flatten)]
    pub opts: HandleLnurlOpts,
}

/// Run the handshake an LNURL designates. Failures have already been
/// reported to the user when the error response is returned.
pub async fn handle_rest(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(req): Json<HandleLnurlRequest>,
) -> Result<Json<FlowOutcome>, AppError> {
    info!(
        user_id = req.user_id,
        message_id = req.opts.message_id,
        correlation_id = %context.correlation_id,
        "Handling lnurl"
    );

    let outcome = state
        .core
        .handle_lnurl(req.user_id, req.text.trim(), req.opts)
        .await?;
    Ok(Json(outcome))
}
