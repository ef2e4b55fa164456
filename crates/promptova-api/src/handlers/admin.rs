//! Admin handlers for manual credit corrections.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::sanitize_string;
use crate::state::AppState;

/// Largest single adjustment accepted.
const MAX_ADJUSTMENT: i64 = 100_000;

/// Credit adjustment request.
#[derive(Debug, Deserialize)]
pub struct AdjustCreditsRequest {
    /// Credits to add (positive) or remove (negative).
    pub delta: i64,
    pub reason: String,
}

/// Credit adjustment response.
#[derive(Debug, Serialize)]
pub struct AdjustCreditsResponse {
    pub uid: String,
    pub credits_before: u32,
    pub credits_after: u32,
}

/// Add or remove credits on a user's balance. Admins only.
pub async fn adjust_user_credits(
    State(state): State<AppState>,
    user: AuthUser,
    Path(uid): Path<String>,
    Json(request): Json<AdjustCreditsRequest>,
) -> ApiResult<Json<AdjustCreditsResponse>> {
    if !state.config.is_admin(&user.uid) {
        return Err(ApiError::forbidden("Admin access required"));
    }
    if request.delta == 0 || request.delta.abs() > MAX_ADJUSTMENT {
        return Err(ApiError::bad_request(format!(
            "delta must be non-zero and at most {} in magnitude",
            MAX_ADJUSTMENT
        )));
    }
    let reason = sanitize_string(&request.reason).trim().to_string();
    if reason.is_empty() {
        return Err(ApiError::bad_request("reason is required"));
    }

    let change = state
        .credit_service
        .adjust_credits(&uid, request.delta, &reason)
        .await?;

    info!(
        admin_uid = %user.uid,
        uid = %uid,
        delta = request.delta,
        credits_after = change.credits_after,
        "Adjusted user credits"
    );

    Ok(Json(AdjustCreditsResponse {
        uid,
        credits_before: change.credits_before,
        credits_after: change.credits_after,
    }))
}
