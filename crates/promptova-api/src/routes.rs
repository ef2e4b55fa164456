//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::admin::adjust_user_credits;
use crate::handlers::ai_tools::refine_prompt;
use crate::handlers::auth::{get_profile, get_profile_by_uid, sync_user};
use crate::handlers::credits::get_credit_history;
use crate::handlers::generation::{
    generate_content, generate_cv, generate_image, generate_video, get_generation_history,
};
use crate::handlers::payment::{create_checkout, stripe_webhook};
use crate::handlers::{health, ready, root};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_limiter = Arc::new(RateLimiterCache::api(state.config.api_rate_limit));
    let generation_limiter =
        Arc::new(RateLimiterCache::generation(state.config.generation_rate_limit));

    // Routes that call an AI provider
    let generation_routes = Router::new()
        .route("/generate/image", post(generate_image))
        .route("/generate/video", post(generate_video))
        .route("/generate/cv", post(generate_cv))
        .route("/generate/content", post(generate_content))
        .route("/ai-tools/refine", post(refine_prompt))
        .layer(middleware::from_fn_with_state(
            generation_limiter,
            rate_limit_middleware,
        ));

    let auth_routes = Router::new()
        .route("/auth/sync", post(sync_user))
        .route("/auth/profile", get(get_profile))
        .route("/auth/profile/:uid", get(get_profile_by_uid));

    let history_routes = Router::new()
        .route("/generate/history", get(get_generation_history))
        .route("/credits/history", get(get_credit_history));

    let payment_routes = Router::new().route("/payment/create-checkout", post(create_checkout));

    let admin_routes =
        Router::new().route("/admin/users/:uid/credits", post(adjust_user_credits));

    let api_routes = Router::new()
        .merge(generation_routes)
        .merge(auth_routes)
        .merge(history_routes)
        .merge(payment_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(
            api_limiter,
            rate_limit_middleware,
        ));

    // Stripe retries on its own schedule; keep it out of the per-IP budget.
    let webhook_routes = Router::new().route("/api/payment/webhook", post(stripe_webhook));

    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
