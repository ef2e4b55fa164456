//! Application state.

use std::sync::Arc;

use anyhow::Context;

use promptova_ai::AiClient;
use promptova_firestore::FirestoreClient;

use crate::auth::JwksCache;
use crate::config::ApiConfig;
use crate::services::stripe::StripeConfig;
use crate::services::{CreditService, GenerationService, StripeClient, UserService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub firestore: FirestoreClient,
    pub ai: AiClient,
    pub stripe: StripeClient,
    pub jwks: Arc<JwksCache>,
    pub user_service: UserService,
    pub credit_service: CreditService,
    pub generation_service: GenerationService,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let firestore = FirestoreClient::from_env()
            .await
            .context("Failed to create Firestore client")?;
        let ai = AiClient::from_env().context("Failed to create AI client")?;
        let stripe =
            StripeClient::new(StripeConfig::from_env()).context("Failed to create Stripe client")?;
        let jwks = JwksCache::from_env()
            .await
            .context("Failed to load Firebase signing keys")?;

        Ok(Self::from_parts(config, firestore, ai, stripe, jwks))
    }

    /// Assemble state from already-built clients.
    pub fn from_parts(
        config: ApiConfig,
        firestore: FirestoreClient,
        ai: AiClient,
        stripe: StripeClient,
        jwks: JwksCache,
    ) -> Self {
        let credit_service = CreditService::new(firestore.clone());
        let generation_service = GenerationService::new(firestore.clone(), credit_service.clone());
        let user_service = UserService::new(firestore.clone());

        Self {
            config,
            firestore,
            ai,
            stripe,
            jwks: Arc::new(jwks),
            user_service,
            credit_service,
            generation_service,
        }
    }
}
