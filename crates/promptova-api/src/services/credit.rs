//! Credit service: plan grants, admin adjustments and the transaction ledger.
//!
//! Balances are changed by [`UserCreditsRepository`] under an `updateTime`
//! precondition. The ledger entry describing each change is written
//! afterwards in a background task; a failed ledger write is logged and
//! counted but never fails the request that moved the credits.

use std::time::Duration;

use tracing::{debug, warn};

use promptova_firestore::{
    BalanceChange, CreditTransactionRepository, FirestoreClient, FirestoreError, PageCursor,
    UserCreditsRepository,
};
use promptova_models::{CreditContext, CreditOperationType, CreditTransaction, PlanTier};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Timeout for background transaction recording.
const TRANSACTION_RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// Service for credit operations outside the generation path.
#[derive(Clone)]
pub struct CreditService {
    firestore: FirestoreClient,
}

impl CreditService {
    pub fn new(firestore: FirestoreClient) -> Self {
        Self { firestore }
    }

    /// Record a credit transaction asynchronously (fire-and-forget).
    ///
    /// Spawns a background task to record the transaction without blocking
    /// the main operation. Failures are logged but do not affect the caller.
    pub fn record_transaction(
        &self,
        uid: &str,
        credits_delta: i64,
        balance_after: u32,
        context: CreditContext,
    ) {
        let firestore = self.firestore.clone();
        let uid = uid.to_string();

        tokio::spawn(async move {
            let repo = CreditTransactionRepository::new(firestore, &uid);

            let tx = CreditTransaction::new(
                uuid::Uuid::new_v4().to_string(),
                uid.clone(),
                context.operation_type,
                credits_delta,
                context.description,
                balance_after,
            )
            .with_optional_generation_id(context.generation_id)
            .with_optional_metadata(context.metadata);

            match tokio::time::timeout(TRANSACTION_RECORD_TIMEOUT, repo.create(&tx)).await {
                Ok(Ok(())) => {
                    debug!(
                        user_id = %uid,
                        transaction_id = %tx.id,
                        credits_delta,
                        "Recorded credit transaction"
                    );
                }
                Ok(Err(e)) => {
                    metrics::record_ledger_write_failure();
                    warn!(user_id = %uid, error = %e, "Failed to record credit transaction");
                }
                Err(_) => {
                    metrics::record_ledger_write_failure();
                    warn!(
                        user_id = %uid,
                        timeout_secs = TRANSACTION_RECORD_TIMEOUT.as_secs(),
                        "Credit transaction recording timed out"
                    );
                }
            }
        });
    }

    /// Activate `plan` for a completed payment identified by `grant_id`.
    ///
    /// Returns `Ok(None)` when the user does not exist. Replays of the same
    /// grant change nothing and record nothing.
    pub async fn grant_plan(
        &self,
        uid: &str,
        plan: PlanTier,
        grant_id: &str,
    ) -> ApiResult<Option<BalanceChange>> {
        let repo = UserCreditsRepository::new(self.firestore.clone(), uid);
        let change = match repo.grant_plan(plan, grant_id).await {
            Ok(change) => change,
            Err(FirestoreError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if change.applied {
            if let Ok(granted) = u64::try_from(change.delta()) {
                metrics::record_credits_granted("plan_activation", granted);
            }
            let context = CreditContext::new(
                CreditOperationType::PlanActivation,
                format!("{} plan activated", plan.as_str()),
            )
            .with_metadata(
                [
                    ("plan".to_string(), plan.as_str().to_string()),
                    ("grant_id".to_string(), grant_id.to_string()),
                ]
                .into_iter()
                .collect(),
            );
            self.record_transaction(uid, change.delta(), change.credits_after, context);
        }

        Ok(Some(change))
    }

    /// Add or remove credits by hand. The balance floors at zero.
    pub async fn adjust_credits(
        &self,
        uid: &str,
        delta: i64,
        reason: &str,
    ) -> ApiResult<BalanceChange> {
        let repo = UserCreditsRepository::new(self.firestore.clone(), uid);
        let change = repo.adjust_credits(delta).await.map_err(|e| match e {
            FirestoreError::NotFound(_) => ApiError::not_found("User not found"),
            e => e.into(),
        })?;

        if change.delta() != 0 {
            if let Ok(granted) = u64::try_from(change.delta()) {
                metrics::record_credits_granted("admin_adjustment", granted);
            }
            let context = CreditContext::new(CreditOperationType::AdminAdjustment, reason);
            self.record_transaction(uid, change.delta(), change.credits_after, context);
        }

        Ok(change)
    }

    /// Get credit transactions for a user with pagination, newest first.
    pub async fn get_history(
        &self,
        uid: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
        operation_type: Option<&str>,
    ) -> ApiResult<(Vec<CreditTransaction>, Option<String>)> {
        let operation_type = match operation_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(op) => Some(CreditOperationType::from_str(op).ok_or_else(|| {
                ApiError::bad_request(format!("Invalid operation_type '{}'", op))
            })?),
            None => None,
        };
        let cursor = match cursor {
            Some(token) => Some(PageCursor::parse(token).ok_or_else(|| {
                ApiError::bad_request("cursor is not a valid page token")
            })?),
            None => None,
        };

        let repo = CreditTransactionRepository::new(self.firestore.clone(), uid);
        let (transactions, next) = repo
            .list_page(limit, cursor.as_ref(), operation_type)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to get credit history: {}", e)))?;
        Ok((transactions, next.map(|c| c.encode())))
    }
}
