use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base directory of the splice workspace
    pub workspace: PathBuf,
    pub gemini_api_key: Option<String>,
    /// Whole-request timeout in seconds; mirroring large sites is slow
    pub request_timeout: u64,
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workspace: PathBuf::from("."),
            gemini_api_key: None,
            request_timeout: 600,
            max_upload_mb: 16,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            host: var("SPLICE_HOST").unwrap_or(defaults.host),
            port: match var("PORT") {
                Some(port) => port.parse().context("PORT must be a valid number")?,
                None => defaults.port,
            },
            workspace: var("SPLICE_WORKSPACE").map(PathBuf::from).unwrap_or(defaults.workspace),
            gemini_api_key: var("GEMINI_API_KEY"),
            request_timeout: match var("SPLICE_REQUEST_TIMEOUT") {
                Some(secs) => secs.parse().context("SPLICE_REQUEST_TIMEOUT must be a number of seconds")?,
                None => defaults.request_timeout,
            },
            max_upload_mb: match var("SPLICE_MAX_UPLOAD_MB") {
                Some(mb) => mb.parse().context("SPLICE_MAX_UPLOAD_MB must be a number")?,
                None => defaults.max_upload_mb,
            },
        })
    }

    /// Socket address to bind, e.g. `0.0.0.0:8080`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.workspace, PathBuf::from("."));
        assert_eq!(config.request_timeout, 600);
        assert_eq!(config.max_upload_bytes(), 16 * 1024 * 1024);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SPLICE_HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("SPLICE_WORKSPACE", "/srv/splice"),
            ("GEMINI_API_KEY", "secret"),
            ("SPLICE_MAX_UPLOAD_MB", "4"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:3000");
        assert_eq!(config.workspace, PathBuf::from("/srv/splice"));
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_upload_mb, 4);
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = ServerConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_port() {
        assert!(ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
    }
}
