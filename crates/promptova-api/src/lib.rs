//! Axum HTTP API server for Promptova.
//!
//! This crate provides:
//! - Paid generation routes (image, video, CV, content) with credit and daily-limit enforcement
//! - Firebase ID token verification
//! - Stripe checkout and webhook handling
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{CreditService, GenerationService, UserService};
pub use state::AppState;
