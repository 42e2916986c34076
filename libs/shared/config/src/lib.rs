use std::env;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOCK_TTL_SECONDS: i64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub session_cookie: String,
    pub clinic_utc_offset: FixedOffset,
    pub lock_ttl_seconds: i64,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            api_base_url: env::var("BOOKING_API_URL")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_API_URL not set, using default");
                    DEFAULT_API_URL.to_string()
                }),
            session_cookie: env::var("BOOKING_SESSION_COOKIE")
                .unwrap_or_else(|_| {
                    warn!("BOOKING_SESSION_COOKIE not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset: env::var("BOOKING_CLINIC_UTC_OFFSET")
                .ok()
                .and_then(|raw| {
                    let parsed = parse_utc_offset(&raw);
                    if parsed.is_none() {
                        warn!("BOOKING_CLINIC_UTC_OFFSET '{}' is not a +HH:MM offset, using UTC", raw);
                    }
                    parsed
                })
                .unwrap_or_else(utc),
            lock_ttl_seconds: env::var("BOOKING_LOCK_TTL_SECONDS")
                .ok()
                .and_then(|raw| raw.parse::<i64>().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(DEFAULT_LOCK_TTL_SECONDS),
            request_timeout: Duration::from_secs(
                env::var("BOOKING_REQUEST_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|raw| raw.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ),
        };

        if !config.is_configured() {
            warn!("Booking client not fully configured - no session cookie");
        }

        config
    }

    /// Config pointing at `base_url` with every other value defaulted.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            session_cookie: String::new(),
            clinic_utc_offset: utc(),
            lock_ttl_seconds: DEFAULT_LOCK_TTL_SECONDS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty() && !self.session_cookie.is_empty()
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("+02:00"), FixedOffset::east_opt(7200));
        assert_eq!(parse_utc_offset("-05:30"), FixedOffset::west_opt(19800));
        assert_eq!(parse_utc_offset("Z"), FixedOffset::east_opt(0));
        assert_eq!(parse_utc_offset("02:00"), None);
        assert_eq!(parse_utc_offset("+25:00"), None);
    }

    #[test]
    fn base_url_config_uses_defaults() {
        let config = AppConfig::for_base_url("http://backend.test");
        assert_eq!(config.api_base_url, "http://backend.test");
        assert_eq!(config.lock_ttl_seconds, 300);
        assert_eq!(config.clinic_utc_offset.local_minus_utc(), 0);
        assert!(!config.is_configured());
    }
}
