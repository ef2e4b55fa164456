//! OpenAI REST client.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{AiError, AiResult};
use crate::metrics::record_call;
use crate::prompts::{content_system_prompt, cv_system_prompt, refine_system_prompt, INVALID_MARKER};
use crate::types::{
    ChatMessage, ChatParams, ChatRequest, ChatResponse, ErrorEnvelope, ImageRequest, ImageSize,
    MediaResponse, RefineOutcome, VideoRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_VIDEO_MODEL: &str = "sora-1.0-turbo";

/// Refinement is a short, strict task.
const REFINE_MAX_TOKENS: u32 = 150;
const REFINE_TEMPERATURE: f32 = 0.3;

/// Long-form writing budget for CVs and content.
const WRITING_MAX_TOKENS: u32 = 2000;

// =============================================================================
// Configuration
// =============================================================================

/// AI provider configuration.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Bearer key; generation endpoints fail with `NotConfigured` without it.
    pub api_key: Option<String>,
    /// API root without trailing slash, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub text_model: String,
    pub refine_model: String,
    pub image_model: String,
    pub video_model: String,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            refine_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl AiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            api_key: var("OPENAI_API_KEY"),
            base_url: var("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            text_model: var("OPENAI_TEXT_MODEL").unwrap_or(defaults.text_model),
            refine_model: var("OPENAI_REFINE_MODEL").unwrap_or(defaults.refine_model),
            image_model: var("OPENAI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            video_model: var("OPENAI_VIDEO_MODEL").unwrap_or(defaults.video_model),
            timeout: var("OPENAI_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// OpenAI client for chat, image and video generation. Cheap to clone.
#[derive(Clone)]
pub struct AiClient {
    http: Client,
    config: AiConfig,
}

impl AiClient {
    pub fn new(config: AiConfig) -> AiResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("promptova-ai/", env!("CARGO_PKG_VERSION")))
            .build()?;
        if config.api_key.is_none() {
            warn!("OPENAI_API_KEY not set; generation endpoints will be unavailable");
        }
        Ok(Self { http, config })
    }

    pub fn from_env() -> AiResult<Self> {
        Self::new(AiConfig::from_env())
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// One chat completion; returns the trimmed assistant text.
    pub async fn chat(&self, params: ChatParams<'_>) -> AiResult<String> {
        let request = ChatRequest {
            model: params.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: params.system,
                },
                ChatMessage {
                    role: "user",
                    content: params.user,
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response: ChatResponse = self.post("chat", "/chat/completions", &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(AiError::EmptyResponse("completion"))
    }

    /// Generate one image and return its URL.
    pub async fn generate_image(
        &self,
        prompt: &str,
        style: Option<&str>,
        size: ImageSize,
    ) -> AiResult<String> {
        let prompt = match style.map(str::trim).filter(|s| !s.is_empty()) {
            Some(style) => format!("{}, in {} style", prompt, style),
            None => prompt.to_string(),
        };
        let request = ImageRequest {
            model: &self.config.image_model,
            prompt: &prompt,
            n: 1,
            size: size.as_dimensions(),
        };

        let response: MediaResponse = self.post("image", "/images/generations", &request).await?;
        first_url(response, "image")
    }

    /// Generate one video and return its URL.
    pub async fn generate_video(&self, prompt: &str, duration_secs: Option<u32>) -> AiResult<String> {
        let request = VideoRequest {
            model: &self.config.video_model,
            prompt,
            duration: duration_secs,
        };

        let response: MediaResponse = self.post("video", "/videos/generations", &request).await?;
        first_url(response, "video")
    }

    /// Validate a prompt and rewrite it into a richer one of the given kind.
    pub async fn refine_prompt(&self, prompt: &str, kind: &str) -> AiResult<RefineOutcome> {
        let system = refine_system_prompt(kind);
        let text = self
            .chat(ChatParams {
                system: &system,
                user: prompt,
                model: &self.config.refine_model,
                max_tokens: Some(REFINE_MAX_TOKENS),
                temperature: Some(REFINE_TEMPERATURE),
            })
            .await?;

        if text.contains(INVALID_MARKER) {
            debug!(kind, "Prompt judged invalid by refiner");
            Ok(RefineOutcome::Invalid)
        } else {
            Ok(RefineOutcome::Refined(text))
        }
    }

    /// Write a CV from the user's details.
    pub async fn write_cv(&self, prompt: &str, template: Option<&str>) -> AiResult<String> {
        let system = cv_system_prompt(template);
        self.chat(ChatParams {
            system: &system,
            user: prompt,
            model: &self.config.text_model,
            max_tokens: Some(WRITING_MAX_TOKENS),
            temperature: None,
        })
        .await
    }

    /// Write a blog post, script, caption or similar.
    pub async fn write_content(&self, prompt: &str, content_type: Option<&str>) -> AiResult<String> {
        let system = content_system_prompt(content_type);
        self.chat(ChatParams {
            system: &system,
            user: prompt,
            model: &self.config.text_model,
            max_tokens: Some(WRITING_MAX_TOKENS),
            temperature: None,
        })
        .await
    }

    /// POST JSON to `{base_url}{path}` with timing, metrics and error mapping.
    async fn post<Req, Resp>(&self, operation: &'static str, path: &str, body: &Req) -> AiResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::NotConfigured("OPENAI_API_KEY is not set".to_string()))?;
        let url = format!("{}{}", self.config.base_url, path);

        let span = info_span!("ai_request", operation, path);
        let start = Instant::now();
        let result = self.send_json(&url, api_key, body).instrument(span).await;

        let elapsed = start.elapsed().as_secs_f64();
        match &result {
            Ok(_) => {
                debug!(operation, latency_secs = elapsed, "AI provider call succeeded");
                record_call(operation, "ok", elapsed);
            }
            Err(e) => {
                warn!(operation, latency_secs = elapsed, error = %e, "AI provider call failed");
                record_call(operation, e.kind(), elapsed);
            }
        }
        result
    }

    async fn send_json<Req, Resp>(&self, url: &str, api_key: &str, body: &Req) -> AiResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .http
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn first_url(response: MediaResponse, what: &'static str) -> AiResult<String> {
    response
        .data
        .into_iter()
        .find_map(|d| d.url)
        .ok_or(AiError::EmptyResponse(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use serial_test::serial;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AiClient {
        AiClient::new(AiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            ..AiConfig::default()
        })
        .unwrap()
    }

    fn chat_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    async fn last_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        serde_json::from_slice(&requests.last().unwrap().body).unwrap()
    }

    #[tokio::test]
    async fn test_refine_prompt_returns_refined_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 150})))
            .respond_with(chat_reply("  A cat in a velvet top hat, golden hour light.  "))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .refine_prompt("a cat in a hatt", "image")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RefineOutcome::Refined("A cat in a velvet top hat, golden hour light.".to_string())
        );

        let body = last_body(&server).await;
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("cinematic image prompt"));
        assert_eq!(body["messages"][1]["content"], "a cat in a hatt");
    }

    #[tokio::test]
    async fn test_refine_prompt_detects_invalid_marker() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(chat_reply("[INVALID]"))
            .mount(&server)
            .await;

        let outcome = client_for(&server).refine_prompt("asdhjkas", "video").await.unwrap();
        assert_eq!(outcome, RefineOutcome::Invalid);
    }

    #[tokio::test]
    async fn test_generate_image_sends_size_and_style() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "created": 1,
                "data": [{"url": "https://img.example.com/1.png"}]
            })))
            .mount(&server)
            .await;

        let url = client_for(&server)
            .generate_image("a lighthouse", Some("oil painting"), ImageSize::Landscape)
            .await
            .unwrap();
        assert_eq!(url, "https://img.example.com/1.png");

        let body = last_body(&server).await;
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["size"], "1792x1024");
        assert_eq!(body["prompt"], "a lighthouse, in oil painting style");
    }

    #[tokio::test]
    async fn test_generate_video_missing_url_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_video("drone over a canyon", Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse("video")));
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached", "type": "requests"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .write_content("launch tweet", Some("tweet"))
            .await
            .unwrap_err();
        match err {
            AiError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "Rate limit reached");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = AiClient::new(AiConfig::default()).unwrap();
        assert!(!client.is_configured());
        let err = client.write_cv("Jane Doe, nurse", None).await.unwrap_err();
        assert!(matches!(err, AiError::NotConfigured(_)));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var("OPENAI_API_KEY", "sk-env");
        std::env::set_var("OPENAI_BASE_URL", "http://localhost:9999/v1/");
        std::env::remove_var("OPENAI_TEXT_MODEL");
        let config = AiConfig::from_env();
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.base_url, "http://localhost:9999/v1");
        assert_eq!(config.text_model, "gpt-4o-mini");
        assert_eq!(config.image_model, "dall-e-3");
        std::env::remove_var("OPENAI_API_KEY");
        std::env::remove_var("OPENAI_BASE_URL");
    }
}
