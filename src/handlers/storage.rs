use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::usage::{QuotaStatus, UsageAccountant};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub usage: i64,
    pub usage_formatted: String,
}

/// Current storage usage for the user
/// GET /api/storage/usage
pub async fn usage(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<UsageResponse>> {
    let usage = UsageAccountant::usage(&state.db, &current_user.id).await?;

    Ok(Json(UsageResponse {
        usage,
        usage_formatted: format!("{:.2} MB", usage as f64 / (1024.0 * 1024.0)),
    }))
}

/// Quota status for the user
/// GET /api/storage/quota
pub async fn quota(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<QuotaStatus>> {
    let status =
        UsageAccountant::quota_status(&state.db, &current_user.id, state.config.quota.bytes)
            .await?;

    Ok(Json(status))
}
