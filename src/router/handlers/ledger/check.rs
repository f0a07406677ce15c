use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCheckResponse {
    pub account: String,
    pub balanced: bool,
}

/// Run the clearing-account check on demand. A violation is answered with
/// the ledger error (500) and raises the same alert as a flow would.
pub async fn handle_rest(
    State(state): State<AppState>,
) -> Result<Json<LedgerCheckResponse>, AppError> {
    state.core.check_ledger("on_demand").await?;
    Ok(Json(LedgerCheckResponse {
        account: state.core.settings.clearing_account.clone(),
        balanced: true,
    }))
}
