//! The global inbox: one shared mailbox with no user accounts, read with
//! the admin token.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};
use tracing::info;

use murmur_db::NewMessage;
use murmur_types::api::{GlobalMessage, GlobalMessageRequest};

use crate::error::ApiError;
use crate::extract::{ClientMeta, ValidJson, token_header};
use crate::notify;
use crate::state::{AppState, run_db, timestamp};

/// POST /message
pub async fn send_global(
    State(state): State<AppState>,
    client: ClientMeta,
    ValidJson(req): ValidJson<GlobalMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let time = req.time.unwrap_or_else(timestamp);
    let (text, at) = (req.message.clone(), time.clone());
    let id = run_db(&state, move |db| {
        db.insert_message(&NewMessage {
            user_id: None,
            ip: client.ip.as_deref(),
            user_agent: client.user_agent.as_deref(),
            time: &at,
            message: &text,
        })
    })
    .await?;
    info!("Global message {} stored", id);

    if let Some(owner) = &state.inbox_owner {
        state
            .mailer
            .submit(notify::new_message(owner, None, &req.message, &time));
    }

    Ok(Json(GlobalMessage {
        id,
        message: req.message,
        time,
    }))
}

/// GET /messages: newest first, admin token required.
pub async fn list_global(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = token_header(&headers).ok_or(ApiError::MissingToken)?;
    if state.admin_token.as_deref() != Some(token) {
        return Err(ApiError::Forbidden("token does not match"));
    }

    let rows = run_db(&state, |db| db.get_global_messages()).await?;
    let messages: Vec<GlobalMessage> = rows
        .into_iter()
        .rev()
        .map(|row| GlobalMessage {
            id: row.id,
            message: row.message,
            time: row.time,
        })
        .collect();
    Ok(Json(messages))
}
