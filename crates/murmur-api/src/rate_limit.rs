//! Per-process fixed-window rate limiting keyed by client IP.
//!
//! Counters live in memory and are not shared between processes, so the
//! limits only hold for a single instance.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::extract::client_ip;

/// Past this many tracked clients, expired windows are swept on insert.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn per_minute(max_requests: u32) -> Self {
        Self { max_requests, window: Duration::from_secs(60) }
    }

    pub fn per_hour(max_requests: u32) -> Self {
        Self { max_requests, window: Duration::from_secs(3600) }
    }
}

/// One limiter per route group.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub signup: RateLimitConfig,
    pub message: RateLimitConfig,
    pub reply: RateLimitConfig,
    pub like: RateLimitConfig,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            signup: RateLimitConfig::per_hour(5),
            message: RateLimitConfig::per_minute(10),
            reply: RateLimitConfig::per_minute(30),
            like: RateLimitConfig::per_minute(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: RateLimitConfig) -> Self {
        Self {
            name,
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request from `ip`. Returns false once the window is full.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= SWEEP_THRESHOLD && !windows.contains_key(&ip) {
            let window = self.config.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window { count: 0, started: now });
        if now.duration_since(entry.started) >= self.config.window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count >= self.config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Route layer: `middleware::from_fn_with_state(limiter, enforce)`.
/// Requests without connect info share one bucket.
pub async fn enforce(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(req.extensions()).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    if !limiter.check(ip) {
        warn!("Rate limit `{}` exceeded by {}", limiter.name, ip);
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}
