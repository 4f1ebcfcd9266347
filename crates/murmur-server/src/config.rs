use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use murmur_api::rate_limit::{RateLimitConfig, RateLimits};

/// Salts that must never reach production.
const PLACEHOLDER_SALTS: &[&str] = &["change-me", "dev-salt-change-me"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub service: String,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// IPv4 or IPv6 literal, e.g. `0.0.0.0` or `::`.
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub master_salt: String,
    pub admin_token: Option<String>,
    pub target_mail: Option<String>,
    /// `None` when any SMTP variable is missing.
    pub mail: Option<MailConfig>,
    /// `ENV=DEV`: never send email.
    pub dev: bool,
    pub limits: RateLimits,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.is_empty());

        let master_salt = var("MASTER_SALT").unwrap_or_default();
        if master_salt.is_empty() || PLACEHOLDER_SALTS.contains(&master_salt.as_str()) {
            bail!("MASTER_SALT is unset or still a placeholder");
        }

        let port = match var("PORT") {
            Some(p) => p.parse().with_context(|| format!("invalid PORT {:?}", p))?,
            None => 3000,
        };

        let host = match var("HOST") {
            Some(h) => h.parse().with_context(|| format!("invalid HOST {:?}", h))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let mail = match (var("MAIL_SERVICE"), var("MAIL_USER"), var("MAIL_PASS")) {
            (Some(service), Some(user), Some(pass)) => Some(MailConfig { service, user, pass }),
            _ => None,
        };

        let defaults = RateLimits::default();
        let limit = |key: &str, default: RateLimitConfig| -> Result<RateLimitConfig> {
            match var(key) {
                Some(v) => Ok(RateLimitConfig {
                    max_requests: v.parse().with_context(|| format!("invalid {} {:?}", key, v))?,
                    window: default.window,
                }),
                None => Ok(default),
            }
        };

        Ok(Self {
            host,
            port,
            db_path: var("DB_PATH").unwrap_or_else(|| "main.db".into()).into(),
            master_salt,
            admin_token: var("TOKEN"),
            target_mail: var("TARGET_MAIL"),
            mail,
            dev: var("ENV").as_deref() == Some("DEV"),
            limits: RateLimits {
                signup: limit("RATE_SIGNUP", defaults.signup)?,
                message: limit("RATE_MESSAGE", defaults.message)?,
                reply: limit("RATE_REPLY", defaults.reply)?,
                like: limit("RATE_LIKE", defaults.like)?,
            },
        })
    }

    pub fn window_summary(&self) -> String {
        let fmt = |c: RateLimitConfig| format!("{}/{}s", c.max_requests, c.window.as_secs());
        format!(
            "signup {}, message {}, reply {}, like {}",
            fmt(self.limits.signup),
            fmt(self.limits.message),
            fmt(self.limits.reply),
            fmt(self.limits.like),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_with_only_salt() {
        let cfg = load(&[("MASTER_SALT", "s3cret")]).unwrap();
        assert_eq!(cfg.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.db_path, PathBuf::from("main.db"));
        assert!(cfg.mail.is_none());
        assert!(cfg.admin_token.is_none());
        assert!(!cfg.dev);
        assert_eq!(cfg.limits.signup, RateLimits::default().signup);
    }

    #[test]
    fn host_accepts_ipv6_literals() {
        let cfg = load(&[("MASTER_SALT", "s"), ("HOST", "::")]).unwrap();
        assert!(cfg.host.is_ipv6() && cfg.host.is_unspecified());

        let cfg = load(&[("MASTER_SALT", "s"), ("HOST", "::1"), ("PORT", "8080")]).unwrap();
        assert_eq!(SocketAddr::from((cfg.host, cfg.port)).to_string(), "[::1]:8080");

        assert!(load(&[("MASTER_SALT", "s"), ("HOST", "localhost")]).is_err());
    }

    #[test]
    fn missing_or_placeholder_salt_is_fatal() {
        assert!(load(&[]).is_err());
        assert!(load(&[("MASTER_SALT", "")]).is_err());
        assert!(load(&[("MASTER_SALT", "change-me")]).is_err());
    }

    #[test]
    fn mail_needs_all_three_vars() {
        let partial = load(&[("MASTER_SALT", "s"), ("MAIL_SERVICE", "smtp.x.io"), ("MAIL_USER", "u@x.io")])
            .unwrap();
        assert!(partial.mail.is_none());

        let full = load(&[
            ("MASTER_SALT", "s"),
            ("MAIL_SERVICE", "smtp.x.io"),
            ("MAIL_USER", "u@x.io"),
            ("MAIL_PASS", "pw"),
            ("ENV", "DEV"),
        ])
        .unwrap();
        assert_eq!(full.mail.unwrap().service, "smtp.x.io");
        assert!(full.dev);
    }

    #[test]
    fn rate_overrides_keep_window() {
        let cfg = load(&[("MASTER_SALT", "s"), ("RATE_LIKE", "5")]).unwrap();
        assert_eq!(cfg.limits.like.max_requests, 5);
        assert_eq!(cfg.limits.like.window, RateLimits::default().like.window);
        assert!(load(&[("MASTER_SALT", "s"), ("RATE_LIKE", "lots")]).is_err());
        assert!(load(&[("MASTER_SALT", "s"), ("PORT", "http")]).is_err());
    }
}
