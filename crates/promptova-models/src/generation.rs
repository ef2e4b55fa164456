//! Generation records and the request payloads that create them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Maximum prompt length accepted by any generation endpoint.
pub const MAX_PROMPT_LENGTH: usize = 5000;

/// Minimum prompt length accepted by the prompt refiner.
pub const MIN_REFINE_PROMPT_LENGTH: usize = 3;

// =============================================================================
// Generation Type
// =============================================================================

/// Kind of content produced by a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    Image,
    Video,
    Cv,
    Content,
}

impl GenerationType {
    /// Every generation type, in display order.
    pub const ALL: [GenerationType; 4] = [
        GenerationType::Image,
        GenerationType::Video,
        GenerationType::Cv,
        GenerationType::Content,
    ];

    /// Returns the type as stored in Firestore.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Cv => "cv",
            Self::Content => "content",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Cv => "CV",
            Self::Content => "Content",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "cv" => Some(Self::Cv),
            "content" => Some(Self::Content),
            _ => None,
        }
    }

    /// Whether results of this type are delivered as a URL (media) rather than text.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

impl std::fmt::Display for GenerationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Generation Record
// =============================================================================

/// Optional parameters recorded alongside a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl GenerationMetadata {
    /// Flatten the populated fields into a string map.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let entries = [
            ("style", &self.style),
            ("resolution", &self.resolution),
            ("duration", &self.duration),
            ("template", &self.template),
            ("content_type", &self.content_type),
        ];
        for (key, value) in entries {
            if let Some(v) = value {
                map.insert(key.to_string(), v.clone());
            }
        }
        map
    }

    /// Rebuild from a string map, ignoring unknown keys.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self {
            style: map.get("style").cloned(),
            resolution: map.get("resolution").cloned(),
            duration: map.get("duration").cloned(),
            template: map.get("template").cloned(),
            content_type: map.get("content_type").cloned(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_map().is_empty()
    }
}

/// A stored record of one AI content-creation request and its result.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Generation {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Owner's Firebase uid.
    pub uid: String,
    /// Kind of content generated.
    #[serde(rename = "type")]
    pub generation_type: GenerationType,
    /// Prompt as submitted (sanitized).
    pub prompt: String,
    /// Result location for images and video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    /// Result body for CV and content generations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default)]
    pub metadata: GenerationMetadata,
    /// Credits charged for this generation.
    pub credit_cost: u32,
    pub created_at: DateTime<Utc>,
}

impl Generation {
    /// Create a new generation record with a fresh id.
    pub fn new(
        uid: impl Into<String>,
        generation_type: GenerationType,
        prompt: impl Into<String>,
        credit_cost: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            uid: uid.into(),
            generation_type,
            prompt: prompt.into(),
            result_url: None,
            text_content: None,
            metadata: GenerationMetadata::default(),
            credit_cost,
            created_at: Utc::now(),
        }
    }

    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.result_url = Some(url.into());
        self
    }

    pub fn with_text_content(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    pub fn with_metadata(mut self, metadata: GenerationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

// =============================================================================
// Request Payloads
// =============================================================================

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Prompt cannot be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Body of `POST /api/generate/image`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateImageRequest {
    #[validate(
        length(max = 5000, message = "Prompt is too long"),
        custom(function = "validate_not_blank")
    )]
    pub prompt: String,
    #[validate(length(max = 64))]
    pub style: Option<String>,
    #[validate(length(max = 32))]
    pub resolution: Option<String>,
}

/// Body of `POST /api/generate/video`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateVideoRequest {
    #[validate(
        length(max = 5000, message = "Prompt is too long"),
        custom(function = "validate_not_blank")
    )]
    pub prompt: String,
    /// Clip length in seconds.
    #[validate(range(min = 1, max = 60, message = "Duration must be between 1 and 60 seconds"))]
    pub duration: Option<u32>,
}

/// Body of `POST /api/generate/cv`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateCvRequest {
    #[validate(
        length(max = 5000, message = "Prompt is too long"),
        custom(function = "validate_not_blank")
    )]
    pub prompt: String,
    #[validate(length(max = 64))]
    pub template: Option<String>,
}

/// Body of `POST /api/generate/content`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateContentRequest {
    #[validate(
        length(max = 5000, message = "Prompt is too long"),
        custom(function = "validate_not_blank")
    )]
    pub prompt: String,
    /// Blog post, script, code, ... (free-form).
    #[serde(alias = "type")]
    #[validate(length(max = 64))]
    pub content_type: Option<String>,
}

/// Body of `POST /api/ai-tools/refine`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefinePromptRequest {
    #[validate(length(
        min = 3,
        max = 5000,
        message = "Prompt is too short to be valid."
    ))]
    pub prompt: String,
    /// What the refined prompt is for (image, video, ...).
    #[serde(rename = "type", default = "default_refine_kind")]
    #[validate(length(max = 32))]
    pub kind: String,
}

fn default_refine_kind() -> String {
    "image".to_string()
}
