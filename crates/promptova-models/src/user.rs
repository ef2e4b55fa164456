//! User profile stored in the `users` collection.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::plan::{PlanTier, STARTER_CREDITS};
use crate::usage::{effective_daily_counts, DailyCounts};

/// User profile and dashboard stats.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserProfile {
    /// Firebase uid (document id).
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub photo_url: String,
    /// Spendable credit balance. Never negative.
    pub credits: u32,
    #[serde(default)]
    pub plan: PlanTier,
    #[serde(default)]
    pub total_generations: u64,
    /// Estimated storage consumed by results, in MB.
    #[serde(default)]
    pub storage_used_mb: f64,
    /// Estimated hours of manual work saved.
    #[serde(default)]
    pub time_saved_hours: f64,
    /// Generations per type on `last_usage_date`.
    #[serde(default)]
    pub daily_counts: DailyCounts,
    /// UTC day (`YYYY-MM-DD`) the daily counters belong to.
    #[serde(default)]
    pub last_usage_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    /// Id of the last payment that activated a plan; replays of it are no-ops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_plan_grant_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A fresh profile with starter credits on the free plan.
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: String::new(),
            photo_url: String::new(),
            credits: STARTER_CREDITS,
            plan: PlanTier::Free,
            total_generations: 0,
            storage_used_mb: 0.0,
            time_saved_hours: 0.0,
            daily_counts: DailyCounts::new(),
            last_usage_date: None,
            stripe_customer_id: None,
            last_plan_grant_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = url.into();
        self
    }

    /// Check if the balance covers `required` credits.
    pub fn has_credits(&self, required: u32) -> bool {
        self.credits >= required
    }

    /// Daily counters as they apply on `today`; empty once the day has rolled over.
    pub fn daily_usage(&self, today: &str) -> DailyCounts {
        effective_daily_counts(&self.daily_counts, self.last_usage_date.as_deref(), today)
    }
}
