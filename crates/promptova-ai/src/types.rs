//! OpenAI wire types and public result types.

use serde::{Deserialize, Serialize};

// =============================================================================
// Public
// =============================================================================

/// Output size of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl ImageSize {
    /// Parse a user-facing resolution. Unknown values fall back to square.
    pub fn from_resolution(resolution: Option<&str>) -> Self {
        match resolution.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
            Some("landscape") | Some("1792x1024") | Some("16:9") => Self::Landscape,
            Some("portrait") | Some("1024x1792") | Some("9:16") => Self::Portrait,
            _ => Self::Square,
        }
    }

    pub fn as_dimensions(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1792x1024",
            Self::Portrait => "1024x1792",
        }
    }
}

/// Verdict of the prompt validator/refiner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    Refined(String),
    /// The prompt was judged gibberish.
    Invalid,
}

/// Parameters of one chat completion.
#[derive(Debug, Clone)]
pub struct ChatParams<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub model: &'a str,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

// =============================================================================
// Wire
// =============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub n: u32,
    pub size: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct VideoRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// Shape shared by the image and video endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct MediaResponse {
    #[serde(default)]
    pub data: Vec<MediaData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MediaData {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_from_resolution() {
        assert_eq!(ImageSize::from_resolution(None), ImageSize::Square);
        assert_eq!(ImageSize::from_resolution(Some("Landscape")), ImageSize::Landscape);
        assert_eq!(ImageSize::from_resolution(Some("1024x1792")), ImageSize::Portrait);
        assert_eq!(ImageSize::from_resolution(Some("8k")), ImageSize::Square);
        assert_eq!(ImageSize::Landscape.as_dimensions(), "1792x1024");
    }
}
