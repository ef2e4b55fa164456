//! Generation records (`generations/{id}`).
//!
//! Records are written together with the owner's stats by
//! [`crate::UserCreditsRepository::save_generation`]; this repository only
//! reads them back. Listing by owner needs a composite index on
//! `(uid ASC, created_at DESC)`, plus `type` when filtering by kind.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use promptova_models::{Generation, GenerationMetadata, GenerationType};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, Filter, StructuredQuery, ToFirestoreValue, Value};

pub(crate) const GENERATIONS_COLLECTION: &str = "generations";

/// Upper bound on one history page.
pub const MAX_HISTORY_LIMIT: u32 = 50;

/// Repository for generation documents.
#[derive(Clone)]
pub struct GenerationRepository {
    client: FirestoreClient,
}

impl GenerationRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Most recent generations of one user, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_HISTORY_LIMIT`.
    pub async fn list_recent(
        &self,
        uid: &str,
        limit: u32,
        generation_type: Option<GenerationType>,
    ) -> FirestoreResult<Vec<Generation>> {
        let mut filters = vec![Filter::equal("uid", uid.to_firestore_value())];
        if let Some(t) = generation_type {
            filters.push(Filter::equal("type", t.as_str().to_firestore_value()));
        }

        let query = StructuredQuery::collection(GENERATIONS_COLLECTION)
            .with_filters(filters)
            .order_by_desc("created_at")
            .limit(limit.clamp(1, MAX_HISTORY_LIMIT));

        let docs = self.client.run_query(None, query).await?;

        let mut generations = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id().unwrap_or_default().to_string();
            match document_to_generation(&doc, &id) {
                Ok(g) => generations.push(g),
                Err(e) => warn!(uid = %uid, generation_id = %id, error = %e, "Skipping unreadable generation"),
            }
        }
        Ok(generations)
    }
}

pub(crate) fn generation_to_fields(generation: &Generation) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), generation.id.to_firestore_value());
    fields.insert("uid".to_string(), generation.uid.to_firestore_value());
    fields.insert(
        "type".to_string(),
        generation.generation_type.as_str().to_firestore_value(),
    );
    fields.insert("prompt".to_string(), generation.prompt.to_firestore_value());
    if let Some(ref url) = generation.result_url {
        fields.insert("result_url".to_string(), url.to_firestore_value());
    }
    if let Some(ref text) = generation.text_content {
        fields.insert("text_content".to_string(), text.to_firestore_value());
    }
    let metadata = generation.metadata.to_map();
    if !metadata.is_empty() {
        fields.insert("metadata".to_string(), metadata.to_firestore_value());
    }
    fields.insert(
        "credit_cost".to_string(),
        generation.credit_cost.to_firestore_value(),
    );
    fields.insert(
        "created_at".to_string(),
        generation.created_at.to_firestore_value(),
    );
    fields
}

pub(crate) fn document_to_generation(doc: &Document, id: &str) -> FirestoreResult<Generation> {
    let type_str: String = doc.get("type").ok_or_else(|| {
        FirestoreError::InvalidResponse(format!("Generation {} has no type", id))
    })?;
    let generation_type = GenerationType::from_str(&type_str).ok_or_else(|| {
        FirestoreError::InvalidResponse(format!(
            "Generation {} has unknown type {}",
            id, type_str
        ))
    })?;

    let metadata = doc
        .get::<HashMap<String, String>>("metadata")
        .map(|m| GenerationMetadata::from_map(&m))
        .unwrap_or_default();

    Ok(Generation {
        id: id.to_string(),
        uid: doc.get("uid").unwrap_or_default(),
        generation_type,
        prompt: doc.get("prompt").unwrap_or_default(),
        result_url: doc.get("result_url"),
        text_content: doc.get("text_content"),
        metadata,
        credit_cost: doc.get("credit_cost").unwrap_or(0),
        created_at: doc.get("created_at").unwrap_or_else(Utc::now),
    })
}
