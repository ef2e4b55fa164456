//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use promptova_firestore::FirestoreError;

use crate::state::AppState;

/// Banner served at `/`.
pub const ROOT_MESSAGE: &str = "Promptova AI API is running";

/// Root banner.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": ROOT_MESSAGE }))
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Liveness endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub firestore: CheckStatus,
    pub ai_provider: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: Option<u64>) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness endpoint.
///
/// Firestore must answer; a missing AI key is reported but only degrades
/// generation routes, so it does not fail the check.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let firestore_check = {
        let start = Instant::now();
        match state.firestore.get_document("_health", "_check").await {
            // NotFound still means Firestore answered
            Ok(_) | Err(FirestoreError::NotFound(_)) => {
                CheckStatus::ok(Some(start.elapsed().as_millis() as u64))
            }
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let ai_check = if state.ai.is_configured() {
        CheckStatus::ok(None)
    } else {
        CheckStatus::error("OPENAI_API_KEY is not set")
    };

    let ready = firestore_check.is_ok();
    let response = ReadinessResponse {
        status: if !ready {
            "unavailable"
        } else if ai_check.is_ok() {
            "ready"
        } else {
            "degraded"
        }
        .to_string(),
        checks: ReadinessChecks {
            firestore: firestore_check,
            ai_provider: ai_check,
        },
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
