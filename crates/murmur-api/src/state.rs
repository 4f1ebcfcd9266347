use std::sync::Arc;

use anyhow::anyhow;
use chrono::{SecondsFormat, Utc};
use tracing::error;

use murmur_db::Database;

use crate::error::ApiError;
use crate::notify::Mailer;

pub type AppState = Arc<AppStateInner>;

/// Everything a handler needs. Built once in `main`, shared by every route,
/// and closed explicitly after the server stops.
pub struct AppStateInner {
    pub db: Database,
    /// Secret mixed into every derived user token.
    pub master_salt: String,
    /// Token that unlocks the global inbox listing. `None` locks it.
    pub admin_token: Option<String>,
    /// Recipient of global-inbox notifications.
    pub inbox_owner: Option<String>,
    pub mailer: Mailer,
}

impl AppStateInner {
    pub fn close(self) -> anyhow::Result<()> {
        self.db.close()
    }
}

/// Run blocking SQL off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
        .map_err(ApiError::Internal)
}

/// Current time as ISO-8601 UTC with milliseconds, e.g. `2024-01-01T12:00:00.000Z`.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
