//! Configuration module for environment variable parsing.
//!
//! All settings are read once at startup. Values that fail to parse fall
//! back to their defaults with a warning.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Default capacity of each work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default broker drain grace period in milliseconds.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 3000;

/// Default base URL of the WhatsApp bridge sidecar.
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:3001";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared bearer secret for the send endpoints
    pub webhook_secret: Option<String>,

    /// Capacity of each of the user and group work queues
    pub queue_capacity: usize,

    /// How long the broker may spend draining queued messages at shutdown
    pub shutdown_grace_ms: u64,

    /// How long open HTTP connections may take to finish at shutdown
    pub http_shutdown_timeout_ms: u64,

    /// Base URL of the WhatsApp bridge
    pub bridge_url: String,

    /// Per-request timeout against the bridge in milliseconds
    pub bridge_request_timeout_ms: u64,

    /// Verbose logging by default
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_secret: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            http_shutdown_timeout_ms: 5000,
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            bridge_request_timeout_ms: 30_000,
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_var("PORT", defaults.port),

            webhook_secret: env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            queue_capacity: parse_capacity("QUEUE_CAPACITY", defaults.queue_capacity),

            shutdown_grace_ms: parse_var("SHUTDOWN_GRACE_MS", defaults.shutdown_grace_ms),

            http_shutdown_timeout_ms: parse_var(
                "HTTP_SHUTDOWN_TIMEOUT_MS",
                defaults.http_shutdown_timeout_ms,
            ),

            bridge_url: env::var("WHATSAPP_BRIDGE_URL")
                .ok()
                .and_then(|raw| normalize_url("WHATSAPP_BRIDGE_URL", &raw))
                .unwrap_or(defaults.bridge_url),

            bridge_request_timeout_ms: parse_var(
                "BRIDGE_REQUEST_TIMEOUT_MS",
                defaults.bridge_request_timeout_ms,
            ),

            debug: debug_from_env(),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn http_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.http_shutdown_timeout_ms)
    }

    pub fn bridge_request_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge_request_timeout_ms)
    }
}

/// Whether `APP_DEBUG=true` is set. Read before logging is initialized.
pub fn debug_from_env() -> bool {
    env::var("APP_DEBUG")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Parse an environment variable, warning and falling back on bad input.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Like `parse_var`, but zero also falls back to the default.
fn parse_capacity(name: &str, default: usize) -> usize {
    match parse_var(name, default) {
        0 => {
            warn!(env_var = name, "Queue capacity must be positive, using default");
            default
        }
        n => n,
    }
}

/// Validate a base URL and strip any trailing slash.
fn normalize_url(name: &str, raw: &str) -> Option<String> {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
            Some(parsed.as_str().trim_end_matches('/').to_string())
        }
        _ => {
            warn!(env_var = name, value = %raw, "Invalid URL, using default");
            None
        }
    }
}
