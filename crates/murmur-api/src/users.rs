use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::info;

use murmur_db::{ProfileField, models::UserRow};
use murmur_types::api::{Profile, ProfileContact, ProfileUpdate};
use murmur_types::validate::{username_charset, username_not_reserved};

use crate::auth::{authorize, derive_token};
use crate::error::ApiError;
use crate::extract::{ValidJson, token_header};
use crate::state::{AppState, run_db};

/// Public projection of a user. Contact settings are only included for the
/// owner. Id, password, ip and user agent never leave the server.
fn profile(user: UserRow, owner: bool) -> Profile {
    let contact = owner.then(|| ProfileContact {
        email: user.email,
        notify_email: user.notify_email,
    });
    Profile {
        username: user.username,
        description: user.description,
        time: user.time,
        contact,
    }
}

/// GET /user/{username}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let owner = token_header(&headers) == Some(derive_token(&state.master_salt, user.id).as_str());
    Ok(Json(profile(user, owner)))
}

/// PATCH /user/{username}: every present field is validated first, then
/// each is written on its own. Absent fields are left alone.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    ValidJson(update): ValidJson<ProfileUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authorize(&state, &username, token_header(&headers)).await?;

    if let Some(new_name) = &update.username {
        username_charset(new_name)?;
        username_not_reserved(new_name)?;
        if *new_name != user.username {
            let name = new_name.clone();
            if run_db(&state, move |db| db.get_user_by_username(&name))
                .await?
                .is_some()
            {
                return Err(ApiError::Conflict("username already taken"));
            }
        }
    }

    let user_id = user.id;
    let refreshed = run_db(&state, move |db| {
        let fields = [
            update.username.as_deref().map(ProfileField::Username),
            update.description.as_deref().map(ProfileField::Description),
            update.email.as_deref().map(ProfileField::Email),
            update.notify_email.map(ProfileField::NotifyEmail),
        ];
        for field in fields.into_iter().flatten() {
            db.update_user_field(user_id, field)?;
        }
        db.get_user_by_id(user_id)
    })
    .await
    .map_err(|e| e.unique_as_conflict("username already taken"))?
    .ok_or(ApiError::NotFound("user"))?;

    info!("Profile of user {} updated", user_id);
    Ok(Json(profile(refreshed, true)))
}
