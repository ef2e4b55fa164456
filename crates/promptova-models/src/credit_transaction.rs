//! Credit transaction data models.
//!
//! Every movement of a user's credit balance is recorded as a transaction:
//! generation charges, plan activations and manual adjustments.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::generation::GenerationType;

/// Type of credit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreditOperationType {
    ImageGeneration,
    VideoGeneration,
    CvGeneration,
    ContentGeneration,
    /// Balance reset to the allowance of a newly activated plan
    PlanActivation,
    /// Manual admin adjustment (refund, correction, etc.)
    AdminAdjustment,
}

impl CreditOperationType {
    /// Operation type charged for a generation.
    pub fn for_generation(generation_type: GenerationType) -> Self {
        match generation_type {
            GenerationType::Image => Self::ImageGeneration,
            GenerationType::Video => Self::VideoGeneration,
            GenerationType::Cv => Self::CvGeneration,
            GenerationType::Content => Self::ContentGeneration,
        }
    }

    /// Returns the operation type as a string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "image_generation",
            Self::VideoGeneration => "video_generation",
            Self::CvGeneration => "cv_generation",
            Self::ContentGeneration => "content_generation",
            Self::PlanActivation => "plan_activation",
            Self::AdminAdjustment => "admin_adjustment",
        }
    }

    /// Returns a human-readable label for the operation type.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ImageGeneration => "Image Generation",
            Self::VideoGeneration => "Video Generation",
            Self::CvGeneration => "CV Generation",
            Self::ContentGeneration => "Content Generation",
            Self::PlanActivation => "Plan Activation",
            Self::AdminAdjustment => "Admin Adjustment",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image_generation" => Some(Self::ImageGeneration),
            "video_generation" => Some(Self::VideoGeneration),
            "cv_generation" => Some(Self::CvGeneration),
            "content_generation" => Some(Self::ContentGeneration),
            "plan_activation" => Some(Self::PlanActivation),
            "admin_adjustment" => Some(Self::AdminAdjustment),
            _ => None,
        }
    }
}

/// A credit transaction record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreditTransaction {
    /// Unique identifier for this transaction (UUID)
    pub id: String,

    pub user_id: String,

    pub timestamp: DateTime<Utc>,

    pub operation_type: CreditOperationType,

    /// Signed change of the balance (negative for charges)
    pub credits_delta: i64,

    pub description: String,

    /// Balance after this transaction
    pub balance_after: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl CreditTransaction {
    /// Create a new credit transaction.
    pub fn new(
        id: String,
        user_id: String,
        operation_type: CreditOperationType,
        credits_delta: i64,
        description: String,
        balance_after: u32,
    ) -> Self {
        Self {
            id,
            user_id,
            timestamp: Utc::now(),
            operation_type,
            credits_delta,
            description,
            balance_after,
            generation_id: None,
            metadata: None,
        }
    }

    /// Set generation ID if Some, otherwise no-op.
    pub fn with_optional_generation_id(mut self, generation_id: Option<String>) -> Self {
        if let Some(id) = generation_id {
            self.generation_id = Some(id);
        }
        self
    }

    /// Set metadata if Some, otherwise no-op.
    pub fn with_optional_metadata(mut self, metadata: Option<HashMap<String, String>>) -> Self {
        if let Some(meta) = metadata {
            self.metadata = Some(meta);
        }
        self
    }
}

/// What a credit movement is for, captured when it happens and recorded later.
#[derive(Debug, Clone)]
pub struct CreditContext {
    pub operation_type: CreditOperationType,
    pub description: String,
    pub generation_id: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

impl CreditContext {
    /// Create a new credit context.
    pub fn new(operation_type: CreditOperationType, description: impl Into<String>) -> Self {
        Self {
            operation_type,
            description: description.into(),
            generation_id: None,
            metadata: None,
        }
    }

    pub fn with_generation_id(mut self, generation_id: impl Into<String>) -> Self {
        self.generation_id = Some(generation_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_type_strings_roundtrip() {
        let all = [
            CreditOperationType::ImageGeneration,
            CreditOperationType::VideoGeneration,
            CreditOperationType::CvGeneration,
            CreditOperationType::ContentGeneration,
            CreditOperationType::PlanActivation,
            CreditOperationType::AdminAdjustment,
        ];
        for op in all {
            assert_eq!(CreditOperationType::from_str(op.as_str()), Some(op));
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, op.as_str());
        }
        assert_eq!(CreditOperationType::from_str("analysis"), None);
    }

    #[test]
    fn test_for_generation() {
        assert_eq!(
            CreditOperationType::for_generation(GenerationType::Cv),
            CreditOperationType::CvGeneration
        );
    }

    #[test]
    fn test_transaction_builders() {
        let tx = CreditTransaction::new(
            "tx-1".into(),
            "uid-1".into(),
            CreditOperationType::ImageGeneration,
            -1,
            "Image generation".into(),
            9,
        )
        .with_optional_generation_id(Some("gen-1".into()))
        .with_optional_metadata(None);

        assert_eq!(tx.generation_id.as_deref(), Some("gen-1"));
        assert!(tx.metadata.is_none());
        assert_eq!(tx.credits_delta, -1);
    }
}
