//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Check that URLs parse and accounts carry valid checksums
//!
//! Returns every problem found, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::EngineConfig;
use crate::numbers::account::is_valid_account;
use crate::numbers::units::validate_raw;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `rpc.url`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str, schemes: &[&str]) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
        return;
    }
    match url::Url::parse(value) {
        Ok(parsed) if schemes.contains(&parsed.scheme()) => {}
        Ok(parsed) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", parsed.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

/// Check a parsed configuration, collecting all problems.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "rpc.url", &config.rpc.url, &["http", "https"]);
    for (i, url) in config.rpc.failover_urls.iter().enumerate() {
        check_url(&mut errors, &format!("rpc.failover_urls[{}]", i), url, &["http", "https"]);
    }
    check_positive(&mut errors, "rpc.timeout_secs", config.rpc.timeout_secs);

    if config.websocket.enabled {
        check_url(&mut errors, "websocket.url", &config.websocket.url, &["ws", "wss"]);
    }
    check_positive(&mut errors, "websocket.reconnect_base_ms", config.websocket.reconnect_base_ms);
    if config.websocket.reconnect_max_ms < config.websocket.reconnect_base_ms {
        errors.push(ValidationError::new(
            "websocket.reconnect_max_ms",
            "must not be below reconnect_base_ms",
        ));
    }

    if !is_valid_account(&config.engine.default_representative) {
        errors.push(ValidationError::new("engine.default_representative", "invalid account"));
    }
    if config.engine.pending_count == 0 {
        errors.push(ValidationError::new("engine.pending_count", "must be greater than zero"));
    }
    check_positive(&mut errors, "engine.pocket_interval_ms", config.engine.pocket_interval_ms);
    check_positive(&mut errors, "engine.confirmation_poll_ms", config.engine.confirmation_poll_ms);
    check_positive(&mut errors, "engine.listener_poll_ms", config.engine.listener_poll_ms);

    if !validate_raw(&config.wallet.minimum_receive) {
        errors.push(ValidationError::new("wallet.minimum_receive", "must be a raw amount"));
    }
    for (i, account) in config.wallet.watch.iter().enumerate() {
        if !is_valid_account(account) {
            errors.push(ValidationError::new(format!("wallet.watch[{}]", i), "invalid account"));
        }
    }

    if config.observability.metrics_enabled && config.observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "invalid socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
