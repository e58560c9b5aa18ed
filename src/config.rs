//! Runtime configuration.
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file. Anything missing falls back to the defaults below.

use std::env;
use std::time::Duration;

use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_NOTIFICATION_MS: u64 = 5000;
pub const DEFAULT_LOGIN_REDIRECT_MS: u64 = 2000;
pub const DEFAULT_LOGIN_URL: &str = "/login";
pub const DEFAULT_CHECKOUT_URL: &str = "/checkout";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    /// Sent as `X-CSRF-TOKEN` on every request.
    pub csrf_token: String,
    pub notification_duration: Duration,
    pub login_url: String,
    pub login_redirect_delay: Duration,
    pub checkout_url: String,
    /// `None` leaves requests without a timeout.
    pub request_timeout: Option<Duration>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            csrf_token: String::new(),
            notification_duration: Duration::from_millis(DEFAULT_NOTIFICATION_MS),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            login_redirect_delay: Duration::from_millis(DEFAULT_LOGIN_REDIRECT_MS),
            checkout_url: DEFAULT_CHECKOUT_URL.to_string(),
            request_timeout: None,
        }
    }
}

impl AppConfig {
    pub fn new(base_url: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: csrf_token.into(),
            ..Self::default()
        }
    }

    /// Loads `.env` if present, then reads the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) => debug!(error = %e, "No .env file loaded"),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup("CART_API_BASE_URL") {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(ConfigError::InvalidUrl {
                    key: "CART_API_BASE_URL".to_string(),
                    value: base_url,
                });
            }
            config.base_url = base_url;
        }
        if let Some(token) = lookup("CART_CSRF_TOKEN") {
            config.csrf_token = token;
        }
        if let Some(url) = lookup("CART_LOGIN_URL") {
            config.login_url = url;
        }
        if let Some(url) = lookup("CART_CHECKOUT_URL") {
            config.checkout_url = url;
        }
        if let Some(ms) = millis(&lookup, "CART_NOTIFICATION_MS")? {
            config.notification_duration = ms;
        }
        if let Some(ms) = millis(&lookup, "CART_LOGIN_REDIRECT_MS")? {
            config.login_redirect_delay = ms;
        }
        config.request_timeout = millis(&lookup, "CART_API_TIMEOUT_MS")?;

        Ok(config)
    }
}

fn millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
                value,
            }),
    }
}
