//! User service: profile sync and the dashboard view of a profile.

use serde::Serialize;
use tracing::info;

use promptova_firestore::{FirestoreClient, UserRepository};
use promptova_models::{today_key, DailyCounts, PlanLimits, UserProfile};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};

/// Profile plus what the dashboard needs to render quotas.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Generations per type today; stale counters read as empty.
    pub usage_today: DailyCounts,
    pub limits: PlanLimits,
}

impl From<UserProfile> for ProfileView {
    fn from(mut profile: UserProfile) -> Self {
        let today = today_key();
        let usage_today = profile.daily_usage(&today);
        profile.daily_counts = usage_today.clone();
        let limits = PlanLimits::for_tier(profile.plan);
        Self {
            profile,
            usage_today,
            limits,
        }
    }
}

/// Service for user profiles.
#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(firestore: FirestoreClient) -> Self {
        Self {
            users: UserRepository::new(firestore),
        }
    }

    /// Create the profile on first sign-in, otherwise refresh identity fields.
    ///
    /// Explicit `name`/`photo_url` win over the token claims.
    pub async fn sync(
        &self,
        user: &AuthUser,
        name: Option<&str>,
        photo_url: Option<&str>,
    ) -> ApiResult<(ProfileView, bool)> {
        let email = user.email.as_deref().unwrap_or_default();
        let display_name = name.or(user.name.as_deref());
        let photo_url = photo_url.or(user.picture.as_deref());

        let synced = self
            .users
            .sync(&user.uid, email, display_name, photo_url)
            .await?;
        if synced.created {
            info!(uid = %user.uid, "New user signed up");
        }
        Ok((ProfileView::from(synced.profile), synced.created))
    }

    /// Profile of `uid`, or 404.
    pub async fn get_profile(&self, uid: &str) -> ApiResult<ProfileView> {
        self.users
            .get(uid)
            .await?
            .map(ProfileView::from)
            .ok_or_else(|| ApiError::not_found("User profile not found"))
    }

    /// Remember the Stripe customer after a completed checkout.
    pub async fn set_stripe_customer(&self, uid: &str, customer_id: &str) -> ApiResult<()> {
        self.users.set_stripe_customer(uid, customer_id).await?;
        Ok(())
    }
}
