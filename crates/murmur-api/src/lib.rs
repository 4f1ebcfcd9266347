pub mod auth;
pub mod error;
pub mod extract;
pub mod inbox;
pub mod messages;
pub mod notify;
pub mod rate_limit;
pub mod replies;
pub mod router;
pub mod state;
pub mod users;

pub use router::router;
pub use state::{AppState, AppStateInner};
