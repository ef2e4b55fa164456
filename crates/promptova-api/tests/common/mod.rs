//! Shared fixtures: an app wired to mock Firestore, OpenAI, Stripe and JWKS servers.

#![allow(dead_code)]

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value as Json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use promptova_ai::{AiClient, AiConfig};
use promptova_api::auth::JwksCache;
use promptova_api::services::stripe::{StripeClient, StripeConfig};
use promptova_api::{create_router, ApiConfig, AppState};
use promptova_firestore::{FirestoreClient, FirestoreConfig, RetryConfig, TokenCache};

pub const PROJECT_ID: &str = "promptova-test";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const UPDATE_TIME: &str = "2026-01-01T00:00:00.000000Z";

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/test_rsa.pem");
const SIGNING_KEY_ID: &str = "test-kid";
const SIGNING_KEY_N: &str = "sqIMidwPhGjO6wXUCrB-JvoHZTkCzHPPl8xJCqhZm6ZBknk2bY61LwSUo1V5IVIkqrXHy59VtfOIEouYi8Nh_PPPfY2VD_st2RLOEwjpGbY0n9g1gtQc4E7lL3L0T_GZt9eUQCWbPBsfoeCcDnkd0h3v_G6PVMSXquVyPur7az3EC4xa34vqlrXJjQCxNNGePHNbMNWSjcVRizKFKhLqBDxdSZQl3wKCD-dothSCp0ocykbWldbpKWbyUt3AbU4UParDSQB6xkB5Z227VGE8Ojf0_gWDZ3OGEDJOW-Roi05jOlwUQoH-HWJ5mrGWnNLElgBpOykv-zo_wLaB6RP0jQ";

pub struct TestApp {
    pub router: Router,
    pub firestore: MockServer,
    pub ai: MockServer,
    pub stripe: MockServer,
    pub jwks: MockServer,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    pub async fn with_config(config: ApiConfig) -> Self {
        let firestore = MockServer::start().await;
        let ai = MockServer::start().await;
        let stripe = MockServer::start().await;
        let jwks = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{
                    "kid": SIGNING_KEY_ID,
                    "kty": "RSA",
                    "alg": "RS256",
                    "use": "sig",
                    "n": SIGNING_KEY_N,
                    "e": "AQAB"
                }]
            })))
            .mount(&jwks)
            .await;

        let firestore_config = FirestoreConfig {
            project_id: PROJECT_ID.to_string(),
            database_id: "(default)".to_string(),
            emulator_host: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            retry: RetryConfig::none(),
        };
        let firestore_client = FirestoreClient::with_token_cache(
            firestore_config,
            format!(
                "{}/v1/projects/{}/databases/(default)/documents",
                firestore.uri(),
                PROJECT_ID
            ),
            TokenCache::fixed("test-token"),
        )
        .expect("firestore client");

        let ai_client = AiClient::new(AiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: ai.uri(),
            ..AiConfig::default()
        })
        .expect("ai client");

        let stripe_client = StripeClient::new(StripeConfig {
            secret_key: Some("sk_test_stripe".to_string()),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            price_pro: Some("price_pro".to_string()),
            price_enterprise: Some("price_enterprise".to_string()),
            api_base: stripe.uri(),
            ..StripeConfig::default()
        })
        .expect("stripe client");

        let jwks_cache =
            JwksCache::lazy(PROJECT_ID, format!("{}/jwks", jwks.uri())).expect("jwks cache");

        let state =
            AppState::from_parts(config, firestore_client, ai_client, stripe_client, jwks_cache);

        Self {
            router: create_router(state, None),
            firestore,
            ai,
            stripe,
            jwks,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Json) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body = if bytes.is_empty() {
            Json::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Json::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Bodies of the Firestore requests whose path ends with `suffix`.
    pub async fn firestore_bodies(&self, http_method: &str, suffix: &str) -> Vec<Json> {
        self.firestore
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == http_method && r.url.path().ends_with(suffix))
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Json::Null))
            .collect()
    }
}

/// A Firebase ID token for `uid`, signed with the test key.
pub fn id_token(uid: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = json!({
        "sub": uid,
        "email": format!("{}@example.com", uid),
        "email_verified": true,
        "name": "Ada Lovelace",
        "iss": format!("https://securetoken.google.com/{}", PROJECT_ID),
        "aud": PROJECT_ID,
        "iat": now,
        "exp": now + 3600,
        "auth_time": now,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(SIGNING_KEY_ID.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).expect("test key");
    encode(&header, &claims, &key).expect("token")
}

pub fn request(http_method: Method, uri: &str, token: Option<&str>, body: Option<Json>) -> Request<Body> {
    let mut builder = Request::builder().method(http_method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Firestore document JSON for user `uid`.
pub fn user_doc(uid: &str, credits: u32, plan: &str, daily: Json, last_usage_date: Option<&str>) -> Json {
    let last = match last_usage_date {
        Some(d) => json!({"stringValue": d}),
        None => json!({"nullValue": null}),
    };
    json!({
        "name": format!("projects/{}/databases/(default)/documents/users/{}", PROJECT_ID, uid),
        "fields": {
            "uid": {"stringValue": uid},
            "email": {"stringValue": format!("{}@example.com", uid)},
            "display_name": {"stringValue": "Ada Lovelace"},
            "credits": {"integerValue": credits.to_string()},
            "plan": {"stringValue": plan},
            "total_generations": {"integerValue": "4"},
            "storage_used_mb": {"doubleValue": 10.0},
            "time_saved_hours": {"doubleValue": 2.0},
            "daily_counts": {"mapValue": {"fields": daily}},
            "last_usage_date": last
        },
        "updateTime": UPDATE_TIME
    })
}

pub async fn mount_user(server: &MockServer, uid: &str, doc: Json) {
    Mock::given(method("GET"))
        .and(path_regex(format!(r"/documents/users/{}$", uid)))
        .respond_with(ResponseTemplate::new(200).set_body_json(doc))
        .mount(server)
        .await;
}

pub async fn mount_missing_user(server: &MockServer, uid: &str) {
    Mock::given(method("GET"))
        .and(path_regex(format!(r"/documents/users/{}$", uid)))
        .respond_with(ResponseTemplate::new(404).set_body_string("NOT_FOUND"))
        .mount(server)
        .await;
}

pub async fn mount_commit(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path_regex(r"/documents:commit$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "writeResults": [{"updateTime": UPDATE_TIME}, {"updateTime": UPDATE_TIME}],
            "commitTime": UPDATE_TIME
        })))
        .expect(expected)
        .mount(server)
        .await;
}

pub fn chat_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": text}}]
    }))
}
