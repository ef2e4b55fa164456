//! Atomic credit and quota operations on a user document.
//!
//! Every write here is a read-modify-write guarded by the document's
//! `updateTime`. A concurrent writer makes the precondition fail, and the
//! operation re-reads and recomputes, so the balance can never go negative
//! and daily counters never skip a request.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use promptova_models::{
    plan_charge, today_key, Generation, GenerationCost, GenerationType, PlanTier, UsageCharge,
    UserProfile,
};

use crate::client::FirestoreClient;
use crate::error::{ChargeError, FirestoreError, FirestoreResult};
use crate::generation_repo::{generation_to_fields, GENERATIONS_COLLECTION};
use crate::metrics::record_precondition_conflict;
use crate::types::{Document, ToFirestoreValue, Value, Write};
use crate::user_repo::{document_to_profile, USERS_COLLECTION};

/// Maximum attempts for one precondition-guarded write.
const MAX_CREDIT_RETRIES: u32 = 5;

/// Linear backoff step between attempts (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

/// User fields written when a generation is charged.
const CHARGE_FIELDS: [&str; 7] = [
    "credits",
    "total_generations",
    "storage_used_mb",
    "time_saved_hours",
    "daily_counts",
    "last_usage_date",
    "updated_at",
];

/// User fields written when a plan is granted.
const GRANT_FIELDS: [&str; 4] = ["plan", "credits", "last_plan_grant_id", "updated_at"];

/// Per-user record of every applied plan grant, keyed by grant id.
const PLAN_GRANTS_COLLECTION: &str = "plan_grants";

/// Result of a successful [`UserCreditsRepository::save_generation`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeOutcome {
    pub credits_after: u32,
    pub total_generations_after: u64,
    /// Today's count for the charged type, including this generation.
    pub daily_count_after: u32,
    /// True when this was the first generation of a new UTC day.
    pub day_reset: bool,
}

impl From<&UsageCharge> for ChargeOutcome {
    fn from(charge: &UsageCharge) -> Self {
        Self {
            credits_after: charge.credits_after,
            total_generations_after: charge.total_generations_after,
            daily_count_after: charge.daily_count_after,
            day_reset: charge.day_reset,
        }
    }
}

/// Balance before and after a plan grant or adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub credits_before: u32,
    pub credits_after: u32,
    /// False when nothing was written (e.g. a replayed plan grant).
    pub applied: bool,
}

impl BalanceChange {
    fn unchanged(credits: u32) -> Self {
        Self {
            credits_before: credits,
            credits_after: credits,
            applied: false,
        }
    }

    pub fn delta(&self) -> i64 {
        i64::from(self.credits_after) - i64::from(self.credits_before)
    }
}

/// Credit operations for one user.
pub struct UserCreditsRepository {
    client: FirestoreClient,
    user_id: String,
}

impl UserCreditsRepository {
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    fn grants_collection(&self) -> String {
        format!("{}/{}/{}", USERS_COLLECTION, self.user_id, PLAN_GRANTS_COLLECTION)
    }

    /// Current profile and the `updateTime` it was read at.
    async fn load(&self) -> FirestoreResult<(UserProfile, Option<String>)> {
        let doc = self
            .client
            .get_document(USERS_COLLECTION, &self.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %self.user_id, "User not found for credit operation");
                FirestoreError::not_found(format!("User {} not found", self.user_id))
            })?;
        let profile = document_to_profile(&doc, &self.user_id)?;
        Ok((profile, doc.update_time))
    }

    /// Check that one generation of `generation_type` would be allowed now.
    ///
    /// Nothing is written. [`Self::save_generation`] re-checks atomically.
    pub async fn precheck(
        &self,
        generation_type: GenerationType,
        cost: &GenerationCost,
    ) -> Result<UserProfile, ChargeError> {
        let (profile, _) = self.load().await?;
        plan_charge(&profile, generation_type, cost, &today_key())?;
        Ok(profile)
    }

    /// Charge one generation and store its record in a single commit.
    ///
    /// The user's balance, daily counter and stats are updated under the
    /// `updateTime` precondition in the same commit that creates the
    /// generation document, so either both land or neither does.
    pub async fn save_generation(
        &self,
        generation: &Generation,
        cost: &GenerationCost,
    ) -> Result<ChargeOutcome, ChargeError> {
        let user_name = self.client.full_document_name(USERS_COLLECTION, &self.user_id);
        let generation_name = self
            .client
            .full_document_name(GENERATIONS_COLLECTION, &generation.id);
        let mut last_error = None;

        for attempt in 0..MAX_CREDIT_RETRIES {
            let (profile, update_time) = self.load().await?;
            let charge = plan_charge(&profile, generation.generation_type, cost, &today_key())?;

            let writes = vec![
                Write::patch(
                    Document::named(user_name.clone(), charge_fields(&charge)),
                    CHARGE_FIELDS.iter().map(|f| f.to_string()).collect(),
                    update_time,
                ),
                Write::create(Document::named(
                    generation_name.clone(),
                    generation_to_fields(generation),
                )),
            ];

            match self.client.commit(writes).await {
                Ok(_) => {
                    info!(
                        user_id = %self.user_id,
                        generation_id = %generation.id,
                        generation_type = %generation.generation_type,
                        credits = cost.credits,
                        credits_after = charge.credits_after,
                        daily_count = charge.daily_count_after,
                        day_reset = charge.day_reset,
                        "Charged generation"
                    );
                    return Ok(ChargeOutcome::from(&charge));
                }
                Err(e) if e.is_precondition_failed() => {
                    self.backoff("save_generation", attempt).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(self.exhausted("save_generation", last_error).into())
    }

    /// Activate a paid plan and reset the balance to its allowance.
    ///
    /// `grant_id` identifies the payment (e.g. a checkout session). Every
    /// applied grant leaves a `plan_grants/{grant_id}` document under the
    /// user, created in the same commit as the balance reset, so a
    /// redelivered payment event is a no-op whatever order it arrives in.
    pub async fn grant_plan(&self, plan: PlanTier, grant_id: &str) -> FirestoreResult<BalanceChange> {
        let user_name = self.client.full_document_name(USERS_COLLECTION, &self.user_id);
        let grants = self.grants_collection();
        let grant_name = self.client.full_document_name(&grants, grant_id);
        let mut last_error = None;

        for attempt in 0..MAX_CREDIT_RETRIES {
            let (profile, update_time) = self.load().await?;
            let replayed = profile.last_plan_grant_id.as_deref() == Some(grant_id)
                || self.client.get_document(&grants, grant_id).await?.is_some();
            if replayed {
                debug!(user_id = %self.user_id, grant_id = %grant_id, "Plan grant already applied");
                return Ok(BalanceChange::unchanged(profile.credits));
            }

            let credits_after = plan.credit_allowance();
            let now = Utc::now();
            let mut fields = HashMap::new();
            fields.insert("plan".to_string(), plan.as_str().to_firestore_value());
            fields.insert("credits".to_string(), credits_after.to_firestore_value());
            fields.insert("last_plan_grant_id".to_string(), grant_id.to_firestore_value());
            fields.insert("updated_at".to_string(), now.to_firestore_value());

            let mut grant_fields = HashMap::new();
            grant_fields.insert("plan".to_string(), plan.as_str().to_firestore_value());
            grant_fields.insert("credits_granted".to_string(), credits_after.to_firestore_value());
            grant_fields.insert("credits_before".to_string(), profile.credits.to_firestore_value());
            grant_fields.insert("granted_at".to_string(), now.to_firestore_value());

            let writes = vec![
                Write::patch(
                    Document::named(user_name.clone(), fields),
                    GRANT_FIELDS.iter().map(|f| f.to_string()).collect(),
                    update_time,
                ),
                Write::create(Document::named(grant_name.clone(), grant_fields)),
            ];

            match self.client.commit(writes).await {
                Ok(_) => {
                    info!(
                        user_id = %self.user_id,
                        plan = %plan,
                        grant_id = %grant_id,
                        credits_before = profile.credits,
                        credits_after,
                        "Activated plan"
                    );
                    return Ok(BalanceChange {
                        credits_before: profile.credits,
                        credits_after,
                        applied: true,
                    });
                }
                // A concurrent delivery of the same event committed first.
                Err(FirestoreError::AlreadyExists(_)) => {
                    debug!(user_id = %self.user_id, grant_id = %grant_id, "Plan grant already applied");
                    return Ok(BalanceChange::unchanged(profile.credits));
                }
                Err(e) if e.is_precondition_failed() => {
                    self.backoff("grant_plan", attempt).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted("grant_plan", last_error))
    }

    /// Add `delta` credits (negative to remove). The balance floors at zero.
    pub async fn adjust_credits(&self, delta: i64) -> FirestoreResult<BalanceChange> {
        let mut last_error = None;

        for attempt in 0..MAX_CREDIT_RETRIES {
            let (profile, update_time) = self.load().await?;
            let credits_after = (i64::from(profile.credits) + delta).clamp(0, i64::from(u32::MAX)) as u32;

            let mut fields = HashMap::new();
            fields.insert("credits".to_string(), credits_after.to_firestore_value());
            fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

            match self
                .client
                .update_document(
                    USERS_COLLECTION,
                    &self.user_id,
                    fields,
                    &["credits", "updated_at"],
                    update_time.as_deref(),
                )
                .await
            {
                Ok(_) => {
                    info!(
                        user_id = %self.user_id,
                        delta,
                        credits_after,
                        "Adjusted credits"
                    );
                    return Ok(BalanceChange {
                        credits_before: profile.credits,
                        credits_after,
                        applied: true,
                    });
                }
                Err(e) if e.is_precondition_failed() => {
                    self.backoff("adjust_credits", attempt).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted("adjust_credits", last_error))
    }

    async fn backoff(&self, operation: &str, attempt: u32) {
        debug!(
            user_id = %self.user_id,
            operation,
            attempt = attempt + 1,
            "Credit write precondition failed, retrying"
        );
        record_precondition_conflict(operation);
        tokio::time::sleep(Duration::from_millis(
            RETRY_BASE_DELAY_MS * (u64::from(attempt) + 1),
        ))
        .await;
    }

    fn exhausted(&self, operation: &str, last_error: Option<FirestoreError>) -> FirestoreError {
        warn!(
            user_id = %self.user_id,
            operation,
            attempts = MAX_CREDIT_RETRIES,
            "Credit write kept losing precondition races"
        );
        last_error.unwrap_or_else(|| {
            FirestoreError::PreconditionFailed(format!(
                "{} for {} failed after {} attempts",
                operation, self.user_id, MAX_CREDIT_RETRIES
            ))
        })
    }
}

fn charge_fields(charge: &UsageCharge) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("credits".to_string(), charge.credits_after.to_firestore_value());
    fields.insert(
        "total_generations".to_string(),
        charge.total_generations_after.to_firestore_value(),
    );
    fields.insert(
        "storage_used_mb".to_string(),
        charge.storage_used_mb_after.to_firestore_value(),
    );
    fields.insert(
        "time_saved_hours".to_string(),
        charge.time_saved_hours_after.to_firestore_value(),
    );
    fields.insert(
        "daily_counts".to_string(),
        charge.daily_counts_after.to_firestore_value(),
    );
    fields.insert(
        "last_usage_date".to_string(),
        charge.usage_date.to_firestore_value(),
    );
    fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_fields_match_mask() {
        let profile = UserProfile::new("uid-1", "a@b.c");
        let cost = GenerationCost::for_type(GenerationType::Image);
        let charge = plan_charge(&profile, GenerationType::Image, &cost, "2026-01-01").unwrap();
        let fields = charge_fields(&charge);

        let mut keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let mut mask = CHARGE_FIELDS.to_vec();
        mask.sort_unstable();
        assert_eq!(keys, mask);
    }

    #[test]
    fn test_balance_change_delta() {
        let change = BalanceChange {
            credits_before: 3,
            credits_after: 500,
            applied: true,
        };
        assert_eq!(change.delta(), 497);
    }
}
