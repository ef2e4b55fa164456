//! Stripe checkout sessions and webhook verification.
//!
//! Sessions are created through the REST API with form-encoded bodies.
//! Webhooks are authenticated with the `Stripe-Signature` header: an
//! HMAC-SHA256 over `"{timestamp}.{payload}"` keyed with the endpoint secret,
//! accepted only within a tolerance window around the signing time.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info};

use promptova_models::PlanTier;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Signatures older than this are rejected to stop replays.
const DEFAULT_WEBHOOK_TOLERANCE: Duration = Duration::from_secs(300);

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("Payments not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Webhook signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("Stripe returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid webhook payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stripe configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_pro: Option<String>,
    pub price_enterprise: Option<String>,
    pub api_base: String,
    pub webhook_tolerance: Duration,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            price_pro: None,
            price_enterprise: None,
            api_base: DEFAULT_API_BASE.to_string(),
            webhook_tolerance: DEFAULT_WEBHOOK_TOLERANCE,
        }
    }
}

impl StripeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            secret_key: var("STRIPE_SECRET_KEY"),
            webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
            price_pro: var("STRIPE_PRICE_PRO"),
            price_enterprise: var("STRIPE_PRICE_ENTERPRISE"),
            api_base: var("STRIPE_API_BASE")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            webhook_tolerance: var("STRIPE_WEBHOOK_TOLERANCE_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE),
        }
    }

    /// Price id that buys `plan`.
    pub fn price_for(&self, plan: PlanTier) -> Option<&str> {
        match plan {
            PlanTier::Pro => self.price_pro.as_deref(),
            PlanTier::Enterprise => self.price_enterprise.as_deref(),
            PlanTier::Free => None,
        }
    }
}

/// A created checkout session.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// What a checkout session is for.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub uid: &'a str,
    pub email: Option<&'a str>,
    pub plan: PlanTier,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// The fields of a completed checkout session this service acts on.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CompletedCheckout {
    /// Uid of the buyer, from metadata or the client reference.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get("userId")
            .map(String::as_str)
            .or(self.client_reference_id.as_deref())
            .filter(|uid| !uid.is_empty())
    }

    /// Plan bought; sessions without a recognizable plan grant Pro.
    pub fn plan(&self) -> PlanTier {
        self.metadata
            .get("plan")
            .and_then(|p| PlanTier::parse_paid(p))
            .unwrap_or(PlanTier::Pro)
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    config: StripeConfig,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self, StripeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    /// Create a subscription checkout session for `plan`.
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, StripeError> {
        let secret_key = self
            .config
            .secret_key
            .as_deref()
            .ok_or(StripeError::NotConfigured("STRIPE_SECRET_KEY is not set"))?;
        let price = self
            .config
            .price_for(request.plan)
            .ok_or(StripeError::NotConfigured("no Stripe price configured for this plan"))?;

        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", price),
            ("line_items[0][quantity]", "1"),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
            ("client_reference_id", request.uid),
            ("metadata[userId]", request.uid),
            ("metadata[plan]", request.plan.as_str()),
        ];
        if let Some(email) = request.email.filter(|e| !e.is_empty()) {
            form.push(("customer_email", email));
        }

        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.config.api_base))
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: CheckoutSession = response.json().await?;
        info!(
            user_id = %request.uid,
            plan = %request.plan,
            session_id = %session.id,
            "Created checkout session"
        );
        Ok(session)
    }

    /// Verify a webhook payload against its `Stripe-Signature` header.
    pub fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, StripeError> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .ok_or(StripeError::NotConfigured("STRIPE_WEBHOOK_SECRET is not set"))?;
        verify_signature(
            payload,
            signature_header,
            secret,
            Utc::now().timestamp(),
            self.config.webhook_tolerance,
        )?;
        let event: WebhookEvent = serde_json::from_slice(payload)?;
        debug!(event_id = %event.id, event_type = %event.event_type, "Verified webhook");
        Ok(event)
    }
}

/// Check a `t=...,v1=...` signature header at time `now` (unix seconds).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance: Duration,
) -> Result<(), StripeError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature("no v1 signature".into()));
    }
    if (now - timestamp).unsigned_abs() > tolerance.as_secs() {
        return Err(StripeError::InvalidSignature(
            "timestamp outside the tolerance zone".into(),
        ));
    }

    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| StripeError::InvalidSignature(format!("invalid secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(StripeError::InvalidSignature(
        "no signature matches the payload".into(),
    ))
}

/// Build a signature header the way Stripe does. Used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, StripeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeError::InvalidSignature(format!("invalid secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "whsec_test_secret";
    const TOLERANCE: Duration = Duration::from_secs(300);

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#;
        let header = sign_payload(payload, SECRET, 1_700_000_000).unwrap();

        assert!(verify_signature(payload, &header, SECRET, 1_700_000_010, TOLERANCE).is_ok());

        let tampered = br#"{"id":"evt_2","type":"checkout.session.completed","data":{"object":{}}}"#;
        assert!(verify_signature(tampered, &header, SECRET, 1_700_000_010, TOLERANCE).is_err());
        assert!(verify_signature(payload, &header, "whsec_other", 1_700_000_010, TOLERANCE).is_err());
    }

    #[test]
    fn test_signature_outside_tolerance() {
        let payload = b"{}";
        let header = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        let err = verify_signature(payload, &header, SECRET, 1_700_000_301, TOLERANCE).unwrap_err();
        assert!(err.to_string().contains("tolerance"));
    }

    #[test]
    fn test_signature_accepts_any_matching_v1() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, 1_700_000_000).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t=1700000000,v1={},v0=legacy,v1={}", "00".repeat(32), good_sig);
        assert!(verify_signature(payload, &header, SECRET, 1_700_000_000, TOLERANCE).is_ok());
    }

    #[test]
    fn test_signature_header_malformed() {
        assert!(verify_signature(b"{}", "v1=abcd", SECRET, 0, TOLERANCE).is_err());
        assert!(verify_signature(b"{}", "t=0", SECRET, 0, TOLERANCE).is_err());
    }

    #[test]
    fn test_completed_checkout_user_and_plan() {
        let session: CompletedCheckout = serde_json::from_value(json!({
            "id": "cs_1",
            "client_reference_id": "uid-ref",
            "metadata": {"userId": "uid-meta", "plan": "enterprise"}
        }))
        .unwrap();
        assert_eq!(session.user_id(), Some("uid-meta"));
        assert_eq!(session.plan(), PlanTier::Enterprise);

        let session: CompletedCheckout = serde_json::from_value(json!({
            "id": "cs_2",
            "client_reference_id": "uid-ref"
        }))
        .unwrap();
        assert_eq!(session.user_id(), Some("uid-ref"));
        assert_eq!(session.plan(), PlanTier::Pro);
    }

    #[tokio::test]
    async fn test_create_checkout_session_posts_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header("authorization", "Bearer sk_test_1"))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("line_items%5B0%5D%5Bprice%5D=price_pro_1"))
            .and(body_string_contains("metadata%5BuserId%5D=uid-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_1",
                "url": "https://checkout.stripe.com/c/pay/cs_test_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StripeClient::new(StripeConfig {
            secret_key: Some("sk_test_1".into()),
            price_pro: Some("price_pro_1".into()),
            api_base: server.uri(),
            ..StripeConfig::default()
        })
        .unwrap();

        let session = client
            .create_checkout_session(&CheckoutRequest {
                uid: "uid-1",
                email: Some("a@b.c"),
                plan: PlanTier::Pro,
                success_url: "http://localhost:3000/dashboard?success=true",
                cancel_url: "http://localhost:3000/dashboard?canceled=true",
            })
            .await
            .unwrap();
        assert_eq!(session.id, "cs_test_1");
        assert!(session.url.unwrap().contains("cs_test_1"));
    }

    #[tokio::test]
    async fn test_checkout_without_price_is_not_configured() {
        let client = StripeClient::new(StripeConfig {
            secret_key: Some("sk_test_1".into()),
            ..StripeConfig::default()
        })
        .unwrap();
        let err = client
            .create_checkout_session(&CheckoutRequest {
                uid: "uid-1",
                email: None,
                plan: PlanTier::Enterprise,
                success_url: "s",
                cancel_url: "c",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StripeError::NotConfigured(_)));
    }
}
