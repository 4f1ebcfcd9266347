use serde::{Deserialize, Serialize};

// -- Auth --

/// Body of both `POST /signup` and `POST /login`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

// -- Messages --

/// Body of `POST /{username}/message`. Echoed back on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub message: String,
}

/// Body of `POST /message` on the global inbox. `time` is optional; when
/// present it must be an ISO-8601 UTC datetime and is stored as given.
/// `ip` and `userAgent` are accepted from older clients but ignored; the
/// connection's own values are recorded instead.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalMessageRequest {
    pub message: String,
    pub time: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, rename = "userAgent")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalMessage {
    pub id: i64,
    pub message: String,
    pub time: String,
}

// -- Replies --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyRequest {
    pub reply: String,
}

/// One row of a message/reply listing. Reply fields are null for messages
/// that have not been answered yet.
#[derive(Debug, Serialize, Deserialize)]
pub struct ThreadEntry {
    pub id: i64,
    pub message: String,
    pub message_time: String,
    pub reply_id: Option<i64>,
    pub reply: Option<String>,
    pub reply_time: Option<String>,
    pub likes: Option<i64>,
}

// -- Profile --

/// Partial profile update. Every field is independent: absent fields are
/// left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub notify_email: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub description: Option<String>,
    pub time: String,
    /// Only present when the request carried a valid token for this user.
    #[serde(flatten)]
    pub contact: Option<ProfileContact>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileContact {
    pub email: Option<String>,
    pub notify_email: bool,
}
