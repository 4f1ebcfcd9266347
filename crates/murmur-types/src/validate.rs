//! Field-level validation for request bodies.
//!
//! Decoding (serde) rejects wrong types, missing required fields and unknown
//! fields. `Validate` then applies the bounds serde cannot express. The
//! username character class is deliberately not part of `Validate`: it is a
//! separate step, run only where a username is created or changed.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::api::{
    Credentials, GlobalMessageRequest, ProfileUpdate, ReplyRequest, SendMessageRequest,
};

pub const MAX_MESSAGE: usize = 256;
pub const MAX_REPLY: usize = 2560;
pub const MAX_USERNAME: usize = 50;
pub const MAX_PASSWORD: usize = 50;
pub const MAX_DESCRIPTION: usize = 100;
pub const MAX_EMAIL: usize = 200;
/// Cap on the legacy `ip`/`userAgent` fields of a global-inbox message.
pub const MAX_CLIENT_FIELD: usize = 1024;

/// First path segments owned by fixed routes. A user with one of these
/// names would be shadowed by the route and never see their inbox.
pub const RESERVED_USERNAMES: &[&str] = &[
    "authenticate",
    "health",
    "like",
    "login",
    "message",
    "messages",
    "signup",
    "unlike",
    "user",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed body: {0}")]
    Malformed(String),
    #[error("`{field}` must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("`{0}` is not a valid email address")]
    InvalidEmail(&'static str),
    #[error("`{0}` is not an ISO-8601 datetime")]
    InvalidDatetime(&'static str),
    #[error("username may only contain letters, digits, '-' and '_'")]
    InvalidUsername,
    #[error("username `{0}` is reserved")]
    ReservedUsername(String),
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

pub fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    max_len(field, value, MAX_EMAIL)?;

    let invalid = || ValidationError::InvalidEmail(field);
    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || host.starts_with('.') || tld.is_empty() {
        return Err(invalid());
    }
    Ok(())
}

/// UTC only, `YYYY-MM-DDTHH:MM:SS[.fff]Z`: upper-case `T` and `Z`, no
/// offsets, no space separator.
pub fn datetime(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidDatetime(field);
    let bytes = value.as_bytes();
    let shaped = bytes.len() >= 20
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[10] == b'T'
        && !bytes.iter().any(u8::is_ascii_whitespace);
    if !shaped {
        return Err(invalid());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|_| ())
        .map_err(|_| invalid())
}

/// `[A-Za-z0-9_-]*`
pub fn username_charset(username: &str) -> Result<(), ValidationError> {
    if username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidUsername)
    }
}

/// Rejects names that collide with a fixed route prefix.
pub fn username_not_reserved(username: &str) -> Result<(), ValidationError> {
    if RESERVED_USERNAMES.contains(&username) {
        return Err(ValidationError::ReservedUsername(username.to_owned()));
    }
    Ok(())
}

impl Validate for Credentials {
    fn validate(&self) -> Result<(), ValidationError> {
        max_len("username", &self.username, MAX_USERNAME)?;
        max_len("password", &self.password, MAX_PASSWORD)
    }
}

impl Validate for SendMessageRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        max_len("message", &self.message, MAX_MESSAGE)
    }
}

impl Validate for GlobalMessageRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        max_len("message", &self.message, MAX_MESSAGE)?;
        if let Some(ip) = &self.ip {
            max_len("ip", ip, MAX_CLIENT_FIELD)?;
        }
        if let Some(user_agent) = &self.user_agent {
            max_len("userAgent", user_agent, MAX_CLIENT_FIELD)?;
        }
        if let Some(time) = &self.time {
            datetime("time", time)?;
        }
        Ok(())
    }
}

impl Validate for ReplyRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        max_len("reply", &self.reply, MAX_REPLY)
    }
}

impl Validate for ProfileUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(username) = &self.username {
            max_len("username", username, MAX_USERNAME)?;
        }
        if let Some(description) = &self.description {
            max_len("description", description, MAX_DESCRIPTION)?;
        }
        if let Some(address) = &self.email {
            email("email", address)?;
        }
        Ok(())
    }
}
