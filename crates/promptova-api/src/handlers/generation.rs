//! Paid generation handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use promptova_ai::ImageSize;
use promptova_models::{
    GenerateContentRequest, GenerateCvRequest, GenerateImageRequest, GenerateVideoRequest,
    Generation, GenerationMetadata, GenerationType,
};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::security::{clean_option, clean_prompt};
use crate::services::{CompletedGeneration, GenerationOutput};
use crate::state::AppState;

/// Response for image and video generations.
#[derive(Debug, Serialize)]
pub struct MediaGenerationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub credits_remaining: u32,
    pub generation_id: String,
}

/// Response for CV and content generations.
#[derive(Debug, Serialize)]
pub struct TextGenerationResponse {
    pub text: String,
    pub credits_remaining: u32,
    pub generation_id: String,
}

impl From<CompletedGeneration> for TextGenerationResponse {
    fn from(done: CompletedGeneration) -> Self {
        Self {
            text: done.generation.text_content.unwrap_or_default(),
            credits_remaining: done.charge.credits_after,
            generation_id: done.generation.id,
        }
    }
}

/// Generate an image (1 credit).
pub async fn generate_image(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateImageRequest>,
) -> ApiResult<Json<MediaGenerationResponse>> {
    request.validate()?;
    let prompt = clean_prompt(&request.prompt)?;
    let style = clean_option(request.style.as_deref());
    let resolution = clean_option(request.resolution.as_deref());
    let size = ImageSize::from_resolution(resolution.as_deref());

    let metadata = GenerationMetadata {
        style: style.clone(),
        resolution: Some(size.as_dimensions().to_string()),
        ..Default::default()
    };

    let ai = state.ai.clone();
    let provider_prompt = prompt.clone();
    let done = state
        .generation_service
        .generate(&user.uid, GenerationType::Image, prompt, metadata, || async move {
            ai.generate_image(&provider_prompt, style.as_deref(), size)
                .await
                .map(GenerationOutput::Url)
        })
        .await?;

    Ok(Json(MediaGenerationResponse {
        image_url: done.generation.result_url.clone(),
        video_url: None,
        credits_remaining: done.charge.credits_after,
        generation_id: done.generation.id,
    }))
}

/// Generate a short video (5 credits).
pub async fn generate_video(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateVideoRequest>,
) -> ApiResult<Json<MediaGenerationResponse>> {
    request.validate()?;
    let prompt = clean_prompt(&request.prompt)?;
    let duration = request.duration;

    let metadata = GenerationMetadata {
        duration: duration.map(|d| d.to_string()),
        ..Default::default()
    };

    let ai = state.ai.clone();
    let provider_prompt = prompt.clone();
    let done = state
        .generation_service
        .generate(&user.uid, GenerationType::Video, prompt, metadata, || async move {
            ai.generate_video(&provider_prompt, duration)
                .await
                .map(GenerationOutput::Url)
        })
        .await?;

    Ok(Json(MediaGenerationResponse {
        image_url: None,
        video_url: done.generation.result_url.clone(),
        credits_remaining: done.charge.credits_after,
        generation_id: done.generation.id,
    }))
}

/// Write a CV (2 credits).
pub async fn generate_cv(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateCvRequest>,
) -> ApiResult<Json<TextGenerationResponse>> {
    request.validate()?;
    let prompt = clean_prompt(&request.prompt)?;
    let template = clean_option(request.template.as_deref());

    let metadata = GenerationMetadata {
        template: template.clone(),
        ..Default::default()
    };

    let ai = state.ai.clone();
    let provider_prompt = prompt.clone();
    let done = state
        .generation_service
        .generate(&user.uid, GenerationType::Cv, prompt, metadata, || async move {
            ai.write_cv(&provider_prompt, template.as_deref())
                .await
                .map(GenerationOutput::Text)
        })
        .await?;

    Ok(Json(done.into()))
}

/// Write blog posts, scripts and other text content (2 credits).
pub async fn generate_content(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateContentRequest>,
) -> ApiResult<Json<TextGenerationResponse>> {
    request.validate()?;
    let prompt = clean_prompt(&request.prompt)?;
    let content_type = clean_option(request.content_type.as_deref());

    let metadata = GenerationMetadata {
        content_type: content_type.clone(),
        ..Default::default()
    };

    let ai = state.ai.clone();
    let provider_prompt = prompt.clone();
    let done = state
        .generation_service
        .generate(&user.uid, GenerationType::Content, prompt, metadata, || async move {
            ai.write_content(&provider_prompt, content_type.as_deref())
                .await
                .map(GenerationOutput::Text)
        })
        .await?;

    Ok(Json(done.into()))
}

/// Query parameters for generation history.
#[derive(Debug, Deserialize)]
pub struct GenerationHistoryQuery {
    pub limit: Option<u32>,
    #[serde(rename = "type")]
    pub generation_type: Option<String>,
}

/// Generation history response.
#[derive(Serialize)]
pub struct GenerationHistoryResponse {
    pub generations: Vec<Generation>,
}

/// The caller's recent generations.
pub async fn get_generation_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<GenerationHistoryQuery>,
) -> ApiResult<Json<GenerationHistoryResponse>> {
    let generations = state
        .generation_service
        .history(&user.uid, query.limit, query.generation_type.as_deref())
        .await?;
    Ok(Json(GenerationHistoryResponse { generations }))
}
