// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the Trello client.

use std::fmt;
use std::time::Duration;

use crate::error::{Result, TrelloError};

/// Default Trello REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.trello.com/1";

/// Configuration for the TrelloClient.
#[derive(Clone)]
pub struct TrelloConfig {
    /// Base URL of the REST API.
    pub api_url: String,
    /// Application key.
    pub api_key: String,
    /// User token authorizing the key.
    pub token: String,
    /// Request timeout.
    pub request_timeout: Duration,
}

impl TrelloConfig {
    /// Create a configuration with default endpoint and timeout.
    pub fn new(api_key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            token: token.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TRELLO_API_KEY`: Application key (required)
    /// - `TRELLO_TOKEN`: User token (required)
    /// - `TRELLO_API_URL`: REST endpoint (default: "https://api.trello.com/1")
    /// - `TRELLO_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TrelloConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| TrelloError::Config(format!("{key} is not set")))
        };
        let api_key = required("TRELLO_API_KEY")?;
        let token = required("TRELLO_TOKEN")?;

        let api_url = lookup("TRELLO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let request_timeout_ms: u64 = lookup("TRELLO_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|| "30000".to_string())
            .parse()
            .map_err(|e| TrelloError::Config(format!("invalid TRELLO_REQUEST_TIMEOUT_MS: {}", e)))?;

        Ok(Self {
            api_url,
            api_key,
            token,
            request_timeout: Duration::from_millis(request_timeout_ms),
        })
    }

    /// Set the REST endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Debug for TrelloConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrelloConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_from_lookup() {
        let config =
            TrelloConfig::from_lookup(lookup(&[("TRELLO_API_KEY", "k"), ("TRELLO_TOKEN", "t")]))
                .unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_token() {
        let err = TrelloConfig::from_lookup(lookup(&[("TRELLO_API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("TRELLO_TOKEN"));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = TrelloConfig::from_lookup(lookup(&[
            ("TRELLO_API_KEY", "k"),
            ("TRELLO_TOKEN", "t"),
            ("TRELLO_REQUEST_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, TrelloError::Config(_)));
    }

    #[test]
    fn test_builder_methods() {
        let config = TrelloConfig::new("k", "t")
            .with_api_url("http://localhost:9000")
            .with_request_timeout(Duration::from_secs(5));
        assert_eq!(config.api_url, "http://localhost:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", TrelloConfig::new("key", "secret-token"));
        assert!(!rendered.contains("secret-token"));
    }
}
