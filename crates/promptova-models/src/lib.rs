//! Shared data models for the Promptova backend.
//!
//! This crate provides Serde-serializable types for:
//! - Users, plans and plan limits
//! - Generations and their request payloads
//! - Per-generation credit costs
//! - Daily quota arithmetic
//! - The credit transaction ledger

pub mod credit_cost;
pub mod credit_transaction;
pub mod generation;
pub mod plan;
pub mod usage;
pub mod user;

// Re-export common types
pub use credit_cost::GenerationCost;
pub use credit_transaction::{CreditContext, CreditOperationType, CreditTransaction};
pub use generation::{
    GenerateContentRequest, GenerateCvRequest, GenerateImageRequest, GenerateVideoRequest,
    Generation, GenerationMetadata, GenerationType, RefinePromptRequest, MAX_PROMPT_LENGTH,
    MIN_REFINE_PROMPT_LENGTH,
};
pub use plan::{PlanLimits, PlanTier, STARTER_CREDITS};
pub use usage::{
    day_key, effective_daily_counts, plan_charge, today_key, DailyCounts, QuotaError,
    UsageCharge,
};
pub use user::UserProfile;
