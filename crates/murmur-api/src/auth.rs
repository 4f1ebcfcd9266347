use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sha2::{Digest, Sha256};
use tracing::info;

use murmur_db::{NewUser, models::UserRow};
use murmur_types::api::{Credentials, TokenResponse};
use murmur_types::validate::{username_charset, username_not_reserved};

use crate::error::ApiError;
use crate::extract::{ClientMeta, ValidJson, token_header};
use crate::state::{AppState, run_db, timestamp};

/// Unsalted SHA-256 of the password, hex encoded. Stored hashes depend on
/// this exact format.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// `hex(SHA256(salt ":" user_id))`. Recomputed per request, never stored.
/// Keyed on the id so a rename keeps the token valid.
pub fn derive_token(master_salt: &str, user_id: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(master_salt.as_bytes());
    hasher.update(b":");
    hasher.update(user_id.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Resolve `username` and check that `token` was derived for it.
///
/// No token and an empty username are both 400, an unknown user is 404 and
/// a token for anyone else is 403.
pub async fn authorize(
    state: &AppState,
    username: &str,
    token: Option<&str>,
) -> Result<UserRow, ApiError> {
    let token = token.ok_or(ApiError::MissingToken)?;
    if username.is_empty() {
        return Err(ApiError::MissingUsername);
    }

    let name = username.to_owned();
    let user = run_db(state, move |db| db.get_user_by_username(&name))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if derive_token(&state.master_salt, user.id) != token {
        return Err(ApiError::Forbidden("token does not match"));
    }
    Ok(user)
}

pub async fn signup(
    State(state): State<AppState>,
    client: ClientMeta,
    ValidJson(req): ValidJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    username_charset(&req.username)?;
    username_not_reserved(&req.username)?;

    let name = req.username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&name))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("username already taken"));
    }

    let password_hash = hash_password(&req.password);
    let username = req.username;
    let time = timestamp();
    let user_id = run_db(&state, move |db| {
        db.create_user(&NewUser {
            ip: client.ip.as_deref(),
            user_agent: client.user_agent.as_deref(),
            username: &username,
            password_hash: &password_hash,
            time: &time,
        })
    })
    .await
    .map_err(|e| e.unique_as_conflict("username already taken"))?;

    info!("New user {} signed up", user_id);
    Ok(StatusCode::OK)
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.username.clone();
    let user = run_db(&state, move |db| db.get_user_by_username(&name))
        .await?
        .ok_or(ApiError::Forbidden("unknown username"))?;

    if hash_password(&req.password) != user.password {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(TokenResponse {
        token: derive_token(&state.master_salt, user.id),
    }))
}

/// GET /authenticate/{username}: succeeds while the token is still good.
pub async fn authenticate(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&state, &username, token_header(&headers)).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_is_plain_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn token_depends_on_salt_and_id() {
        let t = derive_token("salt", 1);
        assert_eq!(t.len(), 64);
        assert_eq!(t, derive_token("salt", 1));
        assert_ne!(t, derive_token("salt", 2));
        assert_ne!(t, derive_token("pepper", 1));
    }

    #[test]
    fn token_matches_manual_digest() {
        let expected = hex::encode(Sha256::digest(b"salt:7"));
        assert_eq!(derive_token("salt", 7), expected);
    }
}
