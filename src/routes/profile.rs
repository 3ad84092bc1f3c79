//! Profile routes.

use axum::extract::State;
use axum::response::Json;

use crate::gateway::{Profile, ProfileUpdate};
use crate::routes::auth::{ApiError, SignedIn};
use crate::state::AppState;

/// `PATCH /api/profile` — patch the signed-in user's profile row.
pub async fn update_profile(
    State(state): State<AppState>,
    SignedIn(user): SignedIn,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    if update.is_empty() {
        return Err(ApiError::bad_request("E_EMPTY_UPDATE", "No profile fields to update."));
    }
    let profile = state.session.update_profile(&user.id, &update).await?;
    Ok(Json(profile))
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
