//! Daily quota and credit arithmetic.
//!
//! These functions are pure: they take the current profile and return the
//! field values to write. The Firestore layer applies them under an
//! `updateTime` precondition so a concurrent writer forces a recompute.
//!
//! Daily counters belong to one UTC day (`last_usage_date`). A counter map
//! whose day is not today is treated as empty and replaced on the next write.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::credit_cost::GenerationCost;
use crate::generation::GenerationType;
use crate::plan::PlanTier;
use crate::user::UserProfile;

/// Generations per type for one day, keyed by [`GenerationType::as_str`].
pub type DailyCounts = BTreeMap<String, u32>;

/// UTC day key in `YYYY-MM-DD` format.
pub fn day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Today's UTC day key.
pub fn today_key() -> String {
    day_key(Utc::now())
}

/// Counters that apply on `today`.
pub fn effective_daily_counts(
    stored: &DailyCounts,
    stored_day: Option<&str>,
    today: &str,
) -> DailyCounts {
    if stored_day == Some(today) {
        stored.clone()
    } else {
        DailyCounts::new()
    }
}

/// Why a generation was refused before reaching a provider.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuotaError {
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u32, available: u32 },

    #[error("Daily {generation_type} limit of {limit} reached on the {plan} plan")]
    DailyLimitReached {
        generation_type: GenerationType,
        limit: u32,
        plan: PlanTier,
    },
}

/// Field values after charging one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCharge {
    pub credits_after: u32,
    pub total_generations_after: u64,
    pub storage_used_mb_after: f64,
    pub time_saved_hours_after: f64,
    pub daily_counts_after: DailyCounts,
    /// Counter value for the charged type after this generation.
    pub daily_count_after: u32,
    /// Day the counters now belong to.
    pub usage_date: String,
    /// True when the stored counters belonged to an earlier day.
    pub day_reset: bool,
}

/// Compute the charge for one generation, or the reason it is refused.
///
/// Credits are checked before the daily limit.
pub fn plan_charge(
    profile: &UserProfile,
    generation_type: GenerationType,
    cost: &GenerationCost,
    today: &str,
) -> Result<UsageCharge, QuotaError> {
    if !profile.has_credits(cost.credits) {
        return Err(QuotaError::InsufficientCredits {
            required: cost.credits,
            available: profile.credits,
        });
    }

    let day_reset = profile.last_usage_date.as_deref() != Some(today);
    let mut counts = profile.daily_usage(today);
    let key = generation_type.as_str();
    let used_today = counts.get(key).copied().unwrap_or(0);

    if let Some(limit) = profile.plan.daily_limit(generation_type) {
        if used_today >= limit {
            return Err(QuotaError::DailyLimitReached {
                generation_type,
                limit,
                plan: profile.plan,
            });
        }
    }

    let daily_count_after = used_today.saturating_add(1);
    counts.insert(key.to_string(), daily_count_after);

    Ok(UsageCharge {
        credits_after: profile.credits - cost.credits,
        total_generations_after: profile.total_generations.saturating_add(1),
        storage_used_mb_after: profile.storage_used_mb + cost.storage_mb,
        time_saved_hours_after: profile.time_saved_hours + cost.time_saved_hours,
        daily_counts_after: counts,
        daily_count_after,
        usage_date: today.to_string(),
        day_reset,
    })
}
