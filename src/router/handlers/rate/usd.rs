use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UsdQuery {
    pub msat: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdResponse {
    pub msat: u64,
    pub usd: f64,
    /// Display form used in pay prompts
    pub formatted: String,
}

pub async fn handle_rest(
    State(state): State<AppState>,
    Query(query): Query<UsdQuery>,
) -> Result<Json<UsdResponse>, AppError> {
    let usd = state.core.rate.to_usd(query.msat).await?;
    Ok(Json(UsdResponse {
        msat: query.msat,
        usd,
        formatted: format!("{:.2} USD", usd),
    }))
}
