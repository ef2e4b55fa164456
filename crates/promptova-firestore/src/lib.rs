//! Firestore REST API client and Promptova repositories.
//!
//! This crate provides:
//! - A Firestore REST client (token cache, retries, commits, structured queries)
//! - User profile repository with sign-in sync
//! - Atomic credit and daily-quota operations on user documents
//! - Generation history and the credit transaction ledger
//! - Service account authentication via gcp_auth, or the local emulator

pub mod client;
pub mod credit_transaction_repo;
pub mod error;
pub mod generation_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod user_credits;
pub mod user_repo;

#[cfg(test)]
mod client_tests;

pub use client::{FirestoreClient, FirestoreConfig};
pub use credit_transaction_repo::{CreditTransactionRepository, PageCursor};
pub use error::{ChargeError, FirestoreError, FirestoreResult};
pub use generation_repo::GenerationRepository;
pub use retry::RetryConfig;
pub use token_cache::TokenCache;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use user_credits::{BalanceChange, ChargeOutcome, UserCreditsRepository};
pub use user_repo::{SyncedUser, UserRepository};
