//! Generation service: quota precheck, provider call, atomic charge.
//!
//! A request is refused with 402/429 before any provider call when the
//! user's balance or daily limit does not allow it. After the provider
//! returns, [`UserCreditsRepository::save_generation`] charges and stores
//! the record in one commit. If a concurrent request drained the balance
//! in between, that commit is refused and the provider result is dropped,
//! so credits never go negative and every stored generation was paid for.

use std::future::Future;

use tracing::{info, warn};

use promptova_ai::AiResult;
use promptova_firestore::{
    ChargeError, ChargeOutcome, FirestoreClient, GenerationRepository, UserCreditsRepository,
};
use promptova_models::{
    CreditContext, CreditOperationType, Generation, GenerationCost, GenerationMetadata,
    GenerationType,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::credit::CreditService;

/// Default page size for generation history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 5;

/// What a provider produced.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutput {
    /// Hosted image or video.
    Url(String),
    /// CV or content text.
    Text(String),
}

/// A charged and stored generation.
#[derive(Debug, Clone)]
pub struct CompletedGeneration {
    pub generation: Generation,
    pub charge: ChargeOutcome,
}

/// Service that runs paid generations.
#[derive(Clone)]
pub struct GenerationService {
    firestore: FirestoreClient,
    generations: GenerationRepository,
    credits: CreditService,
}

impl GenerationService {
    pub fn new(firestore: FirestoreClient, credits: CreditService) -> Self {
        Self {
            generations: GenerationRepository::new(firestore.clone()),
            firestore,
            credits,
        }
    }

    /// Run one generation for `uid`.
    ///
    /// `produce` calls the provider; it only runs once the precheck passed.
    pub async fn generate<F, Fut>(
        &self,
        uid: &str,
        generation_type: GenerationType,
        prompt: String,
        metadata: GenerationMetadata,
        produce: F,
    ) -> ApiResult<CompletedGeneration>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AiResult<GenerationOutput>>,
    {
        let type_label = generation_type.as_str();
        let cost = GenerationCost::for_type(generation_type);
        let repo = UserCreditsRepository::new(self.firestore.clone(), uid);

        if let Err(e) = repo.precheck(generation_type, &cost).await {
            metrics::record_generation(type_label, refusal_outcome(&e));
            return Err(e.into());
        }

        let output = match produce().await {
            Ok(output) => output,
            Err(e) => {
                warn!(uid = %uid, generation_type = type_label, error = %e, "Provider call failed");
                metrics::record_generation(type_label, "provider_error");
                return Err(e.into());
            }
        };

        let mut generation =
            Generation::new(uid, generation_type, prompt, cost.credits).with_metadata(metadata);
        generation = match output {
            GenerationOutput::Url(url) => generation.with_result_url(url),
            GenerationOutput::Text(text) => generation.with_text_content(text),
        };

        let charge = match repo.save_generation(&generation, &cost).await {
            Ok(charge) => charge,
            Err(e) => {
                warn!(
                    uid = %uid,
                    generation_type = type_label,
                    error = %e,
                    "Discarding provider result; charge was refused"
                );
                metrics::record_generation(type_label, refusal_outcome(&e));
                return Err(e.into());
            }
        };

        metrics::record_generation(type_label, "success");
        metrics::record_credits_charged(type_label, cost.credits);

        let context = CreditContext::new(
            CreditOperationType::for_generation(generation_type),
            format!("{} generation", generation_type.label()),
        )
        .with_generation_id(generation.id.clone())
        .with_metadata(cost.to_metadata());
        self.credits.record_transaction(
            uid,
            -i64::from(cost.credits),
            charge.credits_after,
            context,
        );

        info!(
            uid = %uid,
            generation_id = %generation.id,
            generation_type = type_label,
            credits_remaining = charge.credits_after,
            "Generation completed"
        );

        Ok(CompletedGeneration { generation, charge })
    }

    /// Recent generations of `uid`, newest first.
    pub async fn history(
        &self,
        uid: &str,
        limit: Option<u32>,
        generation_type: Option<&str>,
    ) -> ApiResult<Vec<Generation>> {
        let generation_type = match generation_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(t) => Some(GenerationType::from_str(t).ok_or_else(|| {
                ApiError::bad_request(format!(
                    "Invalid type '{}'. Must be one of: image, video, cv, content",
                    t
                ))
            })?),
            None => None,
        };

        Ok(self
            .generations
            .list_recent(uid, limit.unwrap_or(DEFAULT_HISTORY_LIMIT), generation_type)
            .await?)
    }
}

fn refusal_outcome(err: &ChargeError) -> &'static str {
    match err {
        ChargeError::Quota(promptova_models::QuotaError::InsufficientCredits { .. }) => {
            "insufficient_credits"
        }
        ChargeError::Quota(promptova_models::QuotaError::DailyLimitReached { .. }) => {
            "daily_limit"
        }
        ChargeError::Firestore(_) => "store_error",
    }
}
