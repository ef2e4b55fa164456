//! Prompt refinement handler.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;
use validator::Validate;

use promptova_ai::RefineOutcome;
use promptova_models::RefinePromptRequest;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{clean_option, clean_refine_prompt};
use crate::state::AppState;

/// Refine response.
#[derive(Debug, Serialize)]
pub struct RefineResponse {
    pub refined_prompt: String,
}

/// Turn a rough idea into a detailed prompt, or reject gibberish with 422.
///
/// Refinement is free; it only counts against the generation rate limit.
pub async fn refine_prompt(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<RefinePromptRequest>,
) -> ApiResult<Json<RefineResponse>> {
    let prompt = clean_refine_prompt(&request.prompt)?;
    request.validate()?;
    let kind = clean_option(Some(&request.kind)).unwrap_or_else(|| "image".to_string());

    match state.ai.refine_prompt(&prompt, &kind).await? {
        RefineOutcome::Refined(refined_prompt) => {
            info!(uid = %user.uid, kind = %kind, "Refined prompt");
            Ok(Json(RefineResponse { refined_prompt }))
        }
        RefineOutcome::Invalid => Err(ApiError::InvalidPrompt(
            "Your prompt doesn't seem to make sense. Please describe what you want to create."
                .to_string(),
        )),
    }
}
