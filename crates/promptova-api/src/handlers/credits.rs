//! Credit history API handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use promptova_models::CreditTransaction;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Longest accepted `operation_type` filter.
const MAX_OPERATION_TYPE_LENGTH: usize = 50;

/// Query parameters for credit history endpoint.
#[derive(Debug, Deserialize)]
pub struct CreditHistoryQuery {
    /// Page size (clamped to 1..=100, default 50).
    pub limit: Option<u32>,
    /// `next_page_token` of the previous page.
    pub cursor: Option<String>,
    /// Filter by operation type, e.g. `image_generation` or `plan_activation`.
    pub operation_type: Option<String>,
}

/// Credit history response.
#[derive(Serialize)]
pub struct CreditHistoryResponse {
    pub transactions: Vec<CreditTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Get credit history for the authenticated user.
pub async fn get_credit_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CreditHistoryQuery>,
) -> ApiResult<Json<CreditHistoryResponse>> {
    let operation_type = query.operation_type.as_deref();
    if operation_type.is_some_and(|op| op.len() > MAX_OPERATION_TYPE_LENGTH) {
        return Err(ApiError::bad_request("operation_type is too long"));
    }

    let (transactions, next_page_token) = state
        .credit_service
        .get_history(
            &user.uid,
            query.limit,
            query.cursor.as_deref().filter(|c| !c.is_empty()),
            operation_type,
        )
        .await?;

    Ok(Json(CreditHistoryResponse {
        transactions,
        next_page_token,
    }))
}
