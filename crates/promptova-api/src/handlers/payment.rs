//! Stripe checkout and webhook handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use promptova_models::PlanTier;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::stripe::{CheckoutRequest, CompletedCheckout, WebhookEvent};
use crate::state::AppState;

/// Event that activates a plan.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Create-checkout request.
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    #[serde(alias = "planId")]
    pub plan_id: String,
}

/// Create-checkout response.
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub url: String,
    pub session_id: String,
}

/// Start a Stripe subscription checkout for a paid plan.
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> ApiResult<Json<CreateCheckoutResponse>> {
    let plan = PlanTier::parse_paid(&request.plan_id).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Invalid plan_id '{}'. Must be one of: pro, enterprise",
            request.plan_id.trim()
        ))
    })?;

    let success_url = state.config.frontend_link("/dashboard?success=true");
    let cancel_url = state.config.frontend_link("/dashboard?canceled=true");
    let session = state
        .stripe
        .create_checkout_session(&CheckoutRequest {
            uid: &user.uid,
            email: user.email.as_deref(),
            plan,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await?;

    let url = session
        .url
        .ok_or_else(|| ApiError::Provider("Stripe did not return a checkout URL".to_string()))?;

    Ok(Json(CreateCheckoutResponse {
        url,
        session_id: session.id,
    }))
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Receive Stripe events.
///
/// The raw body is needed for signature verification. Events that cannot
/// be applied because the user is unknown are acknowledged so Stripe stops
/// retrying; store failures return 500 so it retries.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::WebhookRejected("missing Stripe-Signature header".to_string()))?;

    let event = match state.stripe.verify_webhook(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Rejected webhook");
            metrics::record_webhook_event("unknown", "rejected");
            return Err(e.into());
        }
    };

    let result = if event.event_type == CHECKOUT_COMPLETED {
        handle_checkout_completed(&state, &event).await
    } else {
        info!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
        Ok("ignored")
    };

    match result {
        Ok(outcome) => {
            metrics::record_webhook_event(&event.event_type, outcome);
            Ok(Json(WebhookResponse { received: true }))
        }
        Err(e) => {
            metrics::record_webhook_event(&event.event_type, "error");
            Err(e)
        }
    }
}

async fn handle_checkout_completed(
    state: &AppState,
    event: &WebhookEvent,
) -> ApiResult<&'static str> {
    let session: CompletedCheckout = serde_json::from_value(event.data.object.clone())
        .map_err(|e| ApiError::WebhookRejected(format!("invalid checkout session: {}", e)))?;

    let Some(uid) = session.user_id() else {
        warn!(event_id = %event.id, session_id = %session.id, "Checkout session has no user id");
        return Ok("ignored");
    };
    let plan = session.plan();

    let change = match state.credit_service.grant_plan(uid, plan, &session.id).await? {
        Some(change) => change,
        None => {
            warn!(uid = %uid, session_id = %session.id, "Checkout completed for unknown user");
            return Ok("user_not_found");
        }
    };

    if let Some(customer) = session.customer.as_deref() {
        if let Err(e) = state.user_service.set_stripe_customer(uid, customer).await {
            error!(uid = %uid, error = %e, "Failed to store Stripe customer id");
        }
    }

    if change.applied {
        info!(
            uid = %uid,
            plan = %plan,
            session_id = %session.id,
            credits_after = change.credits_after,
            "Plan activated"
        );
        Ok("processed")
    } else {
        info!(uid = %uid, session_id = %session.id, "Checkout already applied");
        Ok("duplicate")
    }
}
