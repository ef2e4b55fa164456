//! User profile repository (`users/{uid}`).

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use promptova_models::{DailyCounts, PlanTier, UserProfile};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Value};

pub(crate) const USERS_COLLECTION: &str = "users";

/// Profile fields refreshed from the identity provider on every sync.
const IDENTITY_FIELDS: [&str; 4] = ["email", "display_name", "photo_url", "updated_at"];

/// Outcome of [`UserRepository::sync`].
#[derive(Debug, Clone)]
pub struct SyncedUser {
    pub profile: UserProfile,
    /// True when this sync created the profile.
    pub created: bool,
}

/// Repository for user profile documents.
#[derive(Clone)]
pub struct UserRepository {
    client: FirestoreClient,
}

impl UserRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Get a profile by uid.
    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<UserProfile>> {
        match self.client.get_document(USERS_COLLECTION, uid).await? {
            Some(doc) => Ok(Some(document_to_profile(&doc, uid)?)),
            None => Ok(None),
        }
    }

    /// Get or create the profile for a signed-in user.
    ///
    /// New profiles start with the starter credits on the free plan. Existing
    /// profiles keep their balance and stats; only identity fields that
    /// changed are written back.
    pub async fn sync(
        &self,
        uid: &str,
        email: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> FirestoreResult<SyncedUser> {
        if let Some(existing) = self.get(uid).await? {
            return self
                .refresh_identity(existing, email, display_name, photo_url)
                .await;
        }

        let mut profile = UserProfile::new(uid, email);
        if let Some(name) = display_name {
            profile = profile.with_display_name(name);
        }
        if let Some(url) = photo_url {
            profile = profile.with_photo_url(url);
        }

        match self
            .client
            .create_document(USERS_COLLECTION, uid, profile_to_fields(&profile))
            .await
        {
            Ok(_) => {
                info!(uid = %uid, credits = profile.credits, "Created user profile");
                Ok(SyncedUser {
                    profile,
                    created: true,
                })
            }
            // A concurrent sync created it first.
            Err(FirestoreError::AlreadyExists(_)) => {
                let existing = self
                    .get(uid)
                    .await?
                    .ok_or_else(|| FirestoreError::not_found(format!("users/{}", uid)))?;
                Ok(SyncedUser {
                    profile: existing,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_identity(
        &self,
        mut profile: UserProfile,
        email: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> FirestoreResult<SyncedUser> {
        let mut changed = false;
        if !email.is_empty() && profile.email != email {
            profile.email = email.to_string();
            changed = true;
        }
        if let Some(name) = display_name.filter(|n| *n != profile.display_name) {
            profile.display_name = name.to_string();
            changed = true;
        }
        if let Some(url) = photo_url.filter(|u| *u != profile.photo_url) {
            profile.photo_url = url.to_string();
            changed = true;
        }

        if changed {
            profile.updated_at = Utc::now();
            let mut fields = HashMap::new();
            fields.insert("email".to_string(), profile.email.to_firestore_value());
            fields.insert(
                "display_name".to_string(),
                profile.display_name.to_firestore_value(),
            );
            fields.insert("photo_url".to_string(), profile.photo_url.to_firestore_value());
            fields.insert("updated_at".to_string(), profile.updated_at.to_firestore_value());
            self.client
                .update_document(USERS_COLLECTION, &profile.uid, fields, &IDENTITY_FIELDS, None)
                .await?;
            debug!(uid = %profile.uid, "Refreshed user identity fields");
        }

        Ok(SyncedUser {
            profile,
            created: false,
        })
    }

    /// Remember the Stripe customer created for this user.
    pub async fn set_stripe_customer(&self, uid: &str, customer_id: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert(
            "stripe_customer_id".to_string(),
            customer_id.to_firestore_value(),
        );
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());
        self.client
            .update_document(
                USERS_COLLECTION,
                uid,
                fields,
                &["stripe_customer_id", "updated_at"],
                None,
            )
            .await?;
        Ok(())
    }
}

pub(crate) fn profile_to_fields(profile: &UserProfile) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("uid".to_string(), profile.uid.to_firestore_value());
    fields.insert("email".to_string(), profile.email.to_firestore_value());
    fields.insert(
        "display_name".to_string(),
        profile.display_name.to_firestore_value(),
    );
    fields.insert("photo_url".to_string(), profile.photo_url.to_firestore_value());
    fields.insert("credits".to_string(), profile.credits.to_firestore_value());
    fields.insert("plan".to_string(), profile.plan.as_str().to_firestore_value());
    fields.insert(
        "total_generations".to_string(),
        profile.total_generations.to_firestore_value(),
    );
    fields.insert(
        "storage_used_mb".to_string(),
        profile.storage_used_mb.to_firestore_value(),
    );
    fields.insert(
        "time_saved_hours".to_string(),
        profile.time_saved_hours.to_firestore_value(),
    );
    fields.insert(
        "daily_counts".to_string(),
        profile.daily_counts.to_firestore_value(),
    );
    fields.insert(
        "last_usage_date".to_string(),
        profile.last_usage_date.to_firestore_value(),
    );
    if let Some(ref customer) = profile.stripe_customer_id {
        fields.insert(
            "stripe_customer_id".to_string(),
            customer.to_firestore_value(),
        );
    }
    if let Some(ref grant) = profile.last_plan_grant_id {
        fields.insert("last_plan_grant_id".to_string(), grant.to_firestore_value());
    }
    fields.insert("created_at".to_string(), profile.created_at.to_firestore_value());
    fields.insert("updated_at".to_string(), profile.updated_at.to_firestore_value());
    fields
}

pub(crate) fn document_to_profile(doc: &Document, uid: &str) -> FirestoreResult<UserProfile> {
    if doc.fields.is_none() {
        return Err(FirestoreError::InvalidResponse(format!(
            "User {} has no fields",
            uid
        )));
    }

    let now = Utc::now();
    let created_at = doc.get("created_at").unwrap_or(now);

    Ok(UserProfile {
        uid: uid.to_string(),
        email: doc.get("email").unwrap_or_default(),
        display_name: doc.get("display_name").unwrap_or_default(),
        photo_url: doc.get("photo_url").unwrap_or_default(),
        credits: doc.get("credits").unwrap_or(0),
        plan: doc
            .get::<String>("plan")
            .map(|p| PlanTier::from_str(&p))
            .unwrap_or_default(),
        total_generations: doc.get("total_generations").unwrap_or(0),
        storage_used_mb: doc.get("storage_used_mb").unwrap_or(0.0),
        time_saved_hours: doc.get("time_saved_hours").unwrap_or(0.0),
        daily_counts: doc.get::<DailyCounts>("daily_counts").unwrap_or_default(),
        last_usage_date: doc.get("last_usage_date"),
        stripe_customer_id: doc.get("stripe_customer_id"),
        last_plan_grant_id: doc.get("last_plan_grant_id"),
        created_at,
        updated_at: doc.get("updated_at").unwrap_or(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_fields_round_trip() {
        let mut profile = UserProfile::new("uid-1", "ada@example.com").with_display_name("Ada");
        profile.plan = PlanTier::Pro;
        profile.credits = 499;
        profile.daily_counts.insert("image".into(), 3);
        profile.last_usage_date = Some("2026-01-01".into());

        let doc = Document::new(profile_to_fields(&profile));
        let back = document_to_profile(&doc, "uid-1").unwrap();

        assert_eq!(back.plan, PlanTier::Pro);
        assert_eq!(back.credits, 499);
        assert_eq!(back.display_name, "Ada");
        assert_eq!(back.daily_counts.get("image"), Some(&3));
        assert_eq!(back.last_usage_date.as_deref(), Some("2026-01-01"));
        assert!(back.stripe_customer_id.is_none());
    }

    #[test]
    fn test_legacy_starter_plan_reads_as_free() {
        let mut fields = HashMap::new();
        fields.insert("email".to_string(), "a@b.c".to_firestore_value());
        fields.insert("plan".to_string(), "starter".to_firestore_value());
        fields.insert("credits".to_string(), 7u32.to_firestore_value());
        let profile = document_to_profile(&Document::new(fields), "uid-2").unwrap();
        assert_eq!(profile.plan, PlanTier::Free);
        assert_eq!(profile.credits, 7);
        assert!(profile.daily_counts.is_empty());
    }

    #[test]
    fn test_document_without_fields_is_invalid() {
        let doc = Document {
            name: None,
            fields: None,
            create_time: None,
            update_time: None,
        };
        assert!(document_to_profile(&doc, "uid-3").is_err());
    }
}
