//! Sign-in sync and profile handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::sanitize_string;
use crate::services::ProfileView;
use crate::state::AppState;

/// Optional identity overrides sent by the front end after sign-in.
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default, alias = "displayName")]
    pub name: Option<String>,
    #[serde(default, alias = "photoURL", alias = "photoUrl")]
    pub photo_url: Option<String>,
}

/// Sync response.
#[derive(Serialize)]
pub struct SyncResponse {
    pub created: bool,
    pub user: ProfileView,
}

/// Create the caller's profile on first sign-in, or refresh it.
///
/// Returns 201 when the profile was created.
pub async fn sync_user(
    State(state): State<AppState>,
    user: AuthUser,
    body: Option<Json<SyncRequest>>,
) -> ApiResult<(StatusCode, Json<SyncResponse>)> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let name = request
        .name
        .map(|n| sanitize_string(&n).trim().to_string())
        .filter(|n| !n.is_empty());
    let photo_url = request
        .photo_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    let (profile, created) = state
        .user_service
        .sync(&user, name.as_deref(), photo_url.as_deref())
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(SyncResponse {
            created,
            user: profile,
        }),
    ))
}

/// The caller's own profile.
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ProfileView>> {
    Ok(Json(state.user_service.get_profile(&user.uid).await?))
}

/// Profile by uid; only the owner may read it.
pub async fn get_profile_by_uid(
    State(state): State<AppState>,
    user: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Json<ProfileView>> {
    if uid != user.uid {
        return Err(ApiError::forbidden("You can only view your own profile"));
    }
    Ok(Json(state.user_service.get_profile(&uid).await?))
}
