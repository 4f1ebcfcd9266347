//! Database row types. These map directly to SQLite rows and are kept
//! separate from the murmur-types API bodies.

pub struct UserRow {
    pub id: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub username: String,
    pub password: String,
    pub time: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub notify_email: bool,
}

pub struct MessageRow {
    pub id: i64,
    /// `None` for messages in the global inbox.
    pub user_id: Option<i64>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub time: String,
    pub message: String,
}

pub struct ReplyRow {
    pub id: i64,
    pub time: String,
    pub message_id: i64,
    pub reply: String,
    pub likes: i64,
}

/// A message joined with its (optional) reply.
pub struct ThreadRow {
    pub message_id: i64,
    pub message: String,
    pub message_time: String,
    pub reply_id: Option<i64>,
    pub reply: Option<String>,
    pub reply_time: Option<String>,
    pub likes: Option<i64>,
}
