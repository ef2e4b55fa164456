//! AI provider client for Promptova.
//!
//! Wraps the OpenAI REST API: chat completions for prompt refinement, CVs and
//! written content, and image and video generation.

pub mod client;
pub mod error;
pub mod metrics;
pub mod prompts;
pub mod types;

pub use client::{AiClient, AiConfig};
pub use error::{AiError, AiResult};
pub use types::{ChatParams, ImageSize, RefineOutcome};
