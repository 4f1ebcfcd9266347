use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rate_limit::{self, RateLimiter, RateLimits};
use crate::state::AppState;
use crate::{auth, inbox, messages, replies, users};

/// Build the full HTTP surface. Each rate-limited group gets its own
/// limiter so, e.g., liking cannot exhaust the message budget.
pub fn router(state: AppState, limits: RateLimits) -> Router {
    let signup_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new("signup", limits.signup),
            rate_limit::enforce,
        ));

    let message_routes = Router::new()
        .route("/{username}/message", post(messages::send_message))
        .route("/message", post(inbox::send_global))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new("message", limits.message),
            rate_limit::enforce,
        ));

    let reply_routes = Router::new()
        .route("/{username}/reply/{message_id}", post(replies::send_reply))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new("reply", limits.reply),
            rate_limit::enforce,
        ));

    let like_routes = Router::new()
        .route("/like/{id}", post(replies::like))
        .route("/unlike/{id}", post(replies::unlike))
        .route_layer(middleware::from_fn_with_state(
            RateLimiter::new("like", limits.like),
            rate_limit::enforce,
        ));

    let open_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/authenticate/{username}", get(auth::authenticate))
        .route("/user/{username}", get(users::get_profile).patch(users::update_profile))
        .route("/{username}/messages", get(messages::list_messages))
        .route("/{username}/replies", get(replies::list_replies))
        .route("/messages", get(inbox::list_global))
        .route("/health", get(health));

    Router::new()
        .merge(signup_routes)
        .merge(message_routes)
        .merge(reply_routes)
        .merge(like_routes)
        .merge(open_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
