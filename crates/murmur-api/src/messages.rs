use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::info;

use murmur_db::{NewMessage, models::ThreadRow};
use murmur_types::api::{SendMessageRequest, ThreadEntry};

use crate::auth::authorize;
use crate::error::ApiError;
use crate::extract::{ClientMeta, ValidJson, token_header};
use crate::notify;
use crate::state::{AppState, run_db, timestamp};

/// POST /{username}/message: anonymous message to a user's inbox.
/// Echoes the validated body.
pub async fn send_message(
    State(state): State<AppState>,
    Path(username): Path<String>,
    client: ClientMeta,
    ValidJson(req): ValidJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipient = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let time = timestamp();
    let (user_id, text, at) = (recipient.id, req.message.clone(), time.clone());
    let message_id = run_db(&state, move |db| {
        db.insert_message(&NewMessage {
            user_id: Some(user_id),
            ip: client.ip.as_deref(),
            user_agent: client.user_agent.as_deref(),
            time: &at,
            message: &text,
        })
    })
    .await?;
    info!("Message {} delivered to user {}", message_id, recipient.id);

    if recipient.notify_email {
        if let Some(email) = &recipient.email {
            state.mailer.submit(notify::new_message(
                email,
                Some(&recipient.username),
                &req.message,
                &time,
            ));
        }
    }

    Ok(Json(req))
}

/// GET /{username}/messages: the owner's inbox with replies, newest first.
pub async fn list_messages(
    State(state): State<AppState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = authorize(&state, &username, token_header(&headers)).await?;
    let rows = run_db(&state, move |db| db.get_threads_for_user(user.id)).await?;
    Ok(Json(newest_first(rows)))
}

/// Rows come back oldest first; listings are served newest first.
pub(crate) fn newest_first(rows: Vec<ThreadRow>) -> Vec<ThreadEntry> {
    rows.into_iter()
        .rev()
        .map(|row| ThreadEntry {
            id: row.message_id,
            message: row.message,
            message_time: row.message_time,
            reply_id: row.reply_id,
            reply: row.reply,
            reply_time: row.reply_time,
            likes: row.likes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, reply: Option<&str>) -> ThreadRow {
        ThreadRow {
            message_id: id,
            message: format!("m{id}"),
            message_time: "t".into(),
            reply_id: reply.map(|_| id * 10),
            reply: reply.map(str::to_owned),
            reply_time: reply.map(|_| "t".to_owned()),
            likes: reply.map(|_| 0),
        }
    }

    #[test]
    fn listing_is_reversed() {
        let entries = newest_first(vec![row(1, Some("r")), row(2, None), row(3, None)]);
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, [3, 2, 1]);
        assert_eq!(entries[2].reply.as_deref(), Some("r"));
        assert!(entries[0].reply.is_none());
    }
}
