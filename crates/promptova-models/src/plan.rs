//! Plan configuration: credit allowances and daily generation limits.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationType;

/// Credits granted to every new account.
pub const STARTER_CREDITS: u32 = 10;

/// Credits granted when a Pro subscription is activated.
pub const PRO_CREDIT_ALLOWANCE: u32 = 500;

/// Credits granted when an Enterprise subscription is activated.
pub const ENTERPRISE_CREDIT_ALLOWANCE: u32 = 1000;

/// Plan tier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// Parse from string (case-insensitive). "starter" is the marketing name of the free tier.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pro" => PlanTier::Pro,
            "enterprise" => PlanTier::Enterprise,
            _ => PlanTier::Free,
        }
    }

    /// Parse a paid plan identifier, rejecting anything that is not purchasable.
    pub fn parse_paid(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pro" => Some(PlanTier::Pro),
            "enterprise" => Some(PlanTier::Enterprise),
            _ => None,
        }
    }

    /// Credits the account holds right after switching to this plan.
    pub fn credit_allowance(&self) -> u32 {
        match self {
            PlanTier::Free => STARTER_CREDITS,
            PlanTier::Pro => PRO_CREDIT_ALLOWANCE,
            PlanTier::Enterprise => ENTERPRISE_CREDIT_ALLOWANCE,
        }
    }

    /// Maximum generations of one type per UTC day. `None` means unlimited.
    pub fn daily_limit(&self, generation_type: GenerationType) -> Option<u32> {
        match (self, generation_type) {
            (PlanTier::Free, GenerationType::Image) => Some(10),
            (PlanTier::Free, GenerationType::Video) => Some(2),
            (PlanTier::Free, GenerationType::Cv) => Some(5),
            (PlanTier::Free, GenerationType::Content) => Some(10),
            (PlanTier::Pro, GenerationType::Image) => Some(200),
            (PlanTier::Pro, GenerationType::Video) => Some(40),
            (PlanTier::Pro, GenerationType::Cv) => Some(100),
            (PlanTier::Pro, GenerationType::Content) => Some(200),
            (PlanTier::Enterprise, _) => None,
        }
    }

    /// Get the plan name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plan limits as exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlanLimits {
    /// Plan identifier.
    pub plan_id: String,
    /// Credits granted on activation.
    pub credit_allowance: u32,
    /// Daily limit per generation type; `null` means unlimited.
    pub daily_limits: BTreeMap<String, Option<u32>>,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self::for_tier(PlanTier::Free)
    }
}

impl PlanLimits {
    /// Create limits for a specific plan tier.
    pub fn for_tier(tier: PlanTier) -> Self {
        let daily_limits = GenerationType::ALL
            .iter()
            .map(|t| (t.as_str().to_string(), tier.daily_limit(*t)))
            .collect();

        Self {
            plan_id: tier.as_str().to_string(),
            credit_allowance: tier.credit_allowance(),
            daily_limits,
        }
    }
}
