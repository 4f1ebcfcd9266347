use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, info};

use murmur_types::api::ReplyRequest;

use crate::auth::authorize;
use crate::error::ApiError;
use crate::extract::{PathParams, ValidJson, token_header};
use crate::messages::newest_first;
use crate::state::{AppState, run_db, timestamp};

/// POST /{username}/reply/{message_id}: the owner answers a message, once.
pub async fn send_reply(
    State(state): State<AppState>,
    PathParams((username, message_id)): PathParams<(String, i64)>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<ReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = authorize(&state, &username, token_header(&headers)).await?;

    let user_id = user.id;
    run_db(&state, move |db| db.get_message_for_user(message_id, user_id))
        .await?
        .ok_or(ApiError::NotFound("message"))?;

    if run_db(&state, move |db| db.get_reply_for_message(message_id))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("message already has a reply"));
    }

    let time = timestamp();
    let reply_id = run_db(&state, move |db| db.insert_reply(message_id, &req.reply, &time))
        .await
        .map_err(|e| e.unique_as_conflict("message already has a reply"))?;

    info!("Reply {} posted to message {}", reply_id, message_id);
    Ok(StatusCode::OK)
}

/// GET /{username}/replies: public list of answered messages, newest first.
pub async fn list_replies(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let rows = run_db(&state, move |db| db.get_replies_for_user(user.id)).await?;
    Ok(Json(newest_first(rows)))
}

pub async fn like(
    State(state): State<AppState>,
    PathParams(reply_id): PathParams<i64>,
) -> Result<impl IntoResponse, ApiError> {
    adjust(&state, reply_id, 1).await
}

pub async fn unlike(
    State(state): State<AppState>,
    PathParams(reply_id): PathParams<i64>,
) -> Result<impl IntoResponse, ApiError> {
    adjust(&state, reply_id, -1).await
}

/// Likes have no floor and an unknown id is not an error.
async fn adjust(state: &AppState, reply_id: i64, delta: i64) -> Result<StatusCode, ApiError> {
    let changed = run_db(state, move |db| db.adjust_likes(reply_id, delta)).await?;
    if changed == 0 {
        debug!("Like change on unknown reply {}", reply_id);
    }
    Ok(StatusCode::OK)
}
