//! Credit ledger (`users/{uid}/credit_transactions/{id}`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use promptova_models::{CreditOperationType, CreditTransaction};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{
    Document, Filter, StructuredQuery, ToFirestoreValue, Value, DOCUMENT_ID_FIELD,
};
use crate::user_repo::USERS_COLLECTION;

const TRANSACTIONS_COLLECTION: &str = "credit_transactions";

/// Default and maximum page sizes for [`CreditTransactionRepository::list_page`].
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Repository for one user's credit transactions.
pub struct CreditTransactionRepository {
    client: FirestoreClient,
    user_id: String,
}

impl CreditTransactionRepository {
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self {
            client,
            user_id: user_id.into(),
        }
    }

    fn parent_path(&self) -> String {
        format!("{}/{}", USERS_COLLECTION, self.user_id)
    }

    fn collection(&self) -> String {
        format!("{}/{}", self.parent_path(), TRANSACTIONS_COLLECTION)
    }

    /// Record a transaction.
    pub async fn create(&self, transaction: &CreditTransaction) -> FirestoreResult<()> {
        self.client
            .create_document(
                &self.collection(),
                &transaction.id,
                transaction_to_fields(transaction),
            )
            .await?;
        info!(
            user_id = %self.user_id,
            transaction_id = %transaction.id,
            operation = transaction.operation_type.as_str(),
            credits_delta = transaction.credits_delta,
            "Recorded credit transaction"
        );
        Ok(())
    }

    /// One page of transactions, newest first.
    ///
    /// Entries are ordered by timestamp, then by document name, so entries
    /// sharing a timestamp are neither skipped nor repeated across pages.
    /// Returns the page and the cursor for the page after it, which is
    /// `None` once a short page shows the end was reached.
    pub async fn list_page(
        &self,
        limit: Option<u32>,
        cursor: Option<&PageCursor>,
        operation_type: Option<CreditOperationType>,
    ) -> FirestoreResult<(Vec<CreditTransaction>, Option<PageCursor>)> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let collection = self.collection();

        let mut query = StructuredQuery::collection(TRANSACTIONS_COLLECTION)
            .with_filters(
                operation_type
                    .map(|op| Filter::equal("operation_type", op.as_str().to_firestore_value()))
                    .into_iter()
                    .collect(),
            )
            .order_by_desc("timestamp")
            .order_by_desc(DOCUMENT_ID_FIELD)
            .limit(limit);
        if let Some(cursor) = cursor {
            let mut values = vec![Value::TimestampValue(cursor.timestamp.clone())];
            if let Some(ref id) = cursor.transaction_id {
                values.push(Value::ReferenceValue(
                    self.client.full_document_name(&collection, id),
                ));
            }
            query = query.start_after(values);
        }

        let docs = self
            .client
            .run_query(Some(&self.parent_path()), query)
            .await?;

        let mut transactions = Vec::with_capacity(docs.len());
        for doc in &docs {
            let tx_id = doc.id().unwrap_or_default();
            match document_to_transaction(doc, tx_id) {
                Ok(tx) => transactions.push(tx),
                Err(e) => warn!(
                    user_id = %self.user_id,
                    tx_id = %tx_id,
                    error = %e,
                    "Failed to parse credit transaction document"
                ),
            }
        }

        // Taken from the last document returned, readable or not.
        let next_cursor = if docs.len() as u32 == limit {
            docs.last().and_then(PageCursor::after_document)
        } else {
            None
        };

        Ok((transactions, next_cursor))
    }
}

/// Position after the last entry of a ledger page.
///
/// Serialized as `{timestamp}|{transaction id}`. A bare RFC 3339 timestamp
/// is also accepted and resumes after every entry at that instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub timestamp: String,
    pub transaction_id: Option<String>,
}

impl PageCursor {
    const SEPARATOR: char = '|';

    /// Parse a token previously returned by [`PageCursor::encode`].
    pub fn parse(token: &str) -> Option<Self> {
        let (timestamp, transaction_id) = match token.split_once(Self::SEPARATOR) {
            Some((ts, id)) => (ts, Some(id)),
            None => (token, None),
        };
        DateTime::parse_from_rfc3339(timestamp).ok()?;
        if let Some(id) = transaction_id {
            if id.is_empty() || id.contains('/') {
                return None;
            }
        }
        Some(Self {
            timestamp: timestamp.to_string(),
            transaction_id: transaction_id.map(str::to_string),
        })
    }

    pub fn encode(&self) -> String {
        match self.transaction_id {
            Some(ref id) => format!("{}{}{}", self.timestamp, Self::SEPARATOR, id),
            None => self.timestamp.clone(),
        }
    }

    fn after_document(doc: &Document) -> Option<Self> {
        let timestamp = match doc.fields.as_ref()?.get("timestamp")? {
            Value::TimestampValue(ts) => ts.clone(),
            _ => return None,
        };
        Some(Self {
            timestamp,
            transaction_id: doc.id().map(str::to_string),
        })
    }
}

fn transaction_to_fields(tx: &CreditTransaction) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), tx.id.to_firestore_value());
    fields.insert("user_id".to_string(), tx.user_id.to_firestore_value());
    fields.insert("timestamp".to_string(), tx.timestamp.to_firestore_value());
    fields.insert(
        "operation_type".to_string(),
        tx.operation_type.as_str().to_firestore_value(),
    );
    fields.insert(
        "credits_delta".to_string(),
        tx.credits_delta.to_firestore_value(),
    );
    fields.insert("description".to_string(), tx.description.to_firestore_value());
    fields.insert(
        "balance_after".to_string(),
        tx.balance_after.to_firestore_value(),
    );
    if let Some(ref generation_id) = tx.generation_id {
        fields.insert(
            "generation_id".to_string(),
            generation_id.to_firestore_value(),
        );
    }
    if let Some(ref metadata) = tx.metadata {
        fields.insert("metadata".to_string(), metadata.to_firestore_value());
    }
    fields
}

fn document_to_transaction(doc: &Document, tx_id: &str) -> FirestoreResult<CreditTransaction> {
    let op_str: String = doc.get("operation_type").unwrap_or_default();
    let operation_type = CreditOperationType::from_str(&op_str).ok_or_else(|| {
        FirestoreError::InvalidResponse(format!(
            "Transaction {} has unknown operation type '{}'",
            tx_id, op_str
        ))
    })?;

    Ok(CreditTransaction {
        id: tx_id.to_string(),
        user_id: doc.get("user_id").unwrap_or_default(),
        timestamp: doc.get("timestamp").unwrap_or_else(Utc::now),
        operation_type,
        credits_delta: doc.get("credits_delta").unwrap_or(0),
        description: doc.get("description").unwrap_or_default(),
        balance_after: doc.get("balance_after").unwrap_or(0),
        generation_id: doc.get("generation_id"),
        metadata: doc.get::<HashMap<String, String>>("metadata"),
    })
}
