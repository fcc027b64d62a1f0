//! Configuration module for the origin rewrite filter
//!
//! CRITICAL: Configuration is loaded from Envoy plugin configuration,
//! NOT from external files. This avoids file I/O in the Wasm sandbox.

use serde::Deserialize;

use crate::rewrite::{PortSuffix, UrlPair};

/// Filter configuration loaded from Envoy plugin configuration
#[derive(Clone, Debug, Deserialize)]
pub struct FilterConfig {
    /// Base URL of the backend actually serving content
    pub origin_url: String,

    /// Base URL the proxy presents to clients
    pub public_url: String,

    /// Request header carrying the connecting client IP
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,

    /// Response headers whose values go through the ruleset
    #[serde(default = "default_rewrite_response_headers")]
    pub rewrite_response_headers: Vec<String>,

    /// Maximum text body size to buffer for rewriting (prevent OOM)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,

    /// Always append `:<port>` to rewritten bare hostnames, even without a port
    #[serde(default)]
    pub legacy_host_port_suffix: bool,

    /// Whether to emit per-request audit events
    #[serde(default = "default_log_rewrites")]
    pub log_rewrites: bool,
}

fn default_client_ip_header() -> String {
    "cf-connecting-ip".to_string()
}

fn default_rewrite_response_headers() -> Vec<String> {
    vec!["link".to_string()]
}

fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_log_rewrites() -> bool {
    true
}

impl FilterConfig {
    /// Create a configuration for a URL pair with every other field defaulted
    pub fn new(origin_url: &str, public_url: &str) -> Self {
        Self {
            origin_url: origin_url.to_string(),
            public_url: public_url.to_string(),
            client_ip_header: default_client_ip_header(),
            rewrite_response_headers: default_rewrite_response_headers(),
            max_body_size: default_max_body_size(),
            legacy_host_port_suffix: false,
            log_rewrites: default_log_rewrites(),
        }
    }

    /// Parse configuration from JSON bytes (from Envoy plugin configuration)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config_str = std::str::from_utf8(bytes)
            .map_err(|e| ConfigError::InvalidUtf8(e.to_string()))?;

        let config: Self = serde_json::from_str(config_str)
            .map_err(|e| ConfigError::InvalidJson(e.to_string()))?;

        // Reject bad URLs at load time rather than on the first request
        config.url_pair()?;
        Ok(config)
    }

    /// Build the origin/public pair described by this configuration
    pub fn url_pair(&self) -> Result<UrlPair, ConfigError> {
        UrlPair::parse(&self.origin_url, &self.public_url)
    }

    /// Port rendering for the bare-hostname rule
    pub fn port_suffix(&self) -> PortSuffix {
        if self.legacy_host_port_suffix {
            PortSuffix::Always
        } else {
            PortSuffix::Explicit
        }
    }

    /// Check if a response header should be rewritten
    pub fn rewrites_response_header(&self, name: &str) -> bool {
        self.rewrite_response_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(name))
    }
}

/// Configuration parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidUtf8(String),
    InvalidJson(String),
    InvalidUrl { field: &'static str, reason: String },
    MissingHost(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidUtf8(e) => write!(f, "Invalid UTF-8: {}", e),
            ConfigError::InvalidJson(e) => write!(f, "Invalid JSON: {}", e),
            ConfigError::InvalidUrl { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            ConfigError::MissingHost(field) => write!(f, "{} has no host", field),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "origin_url": "https://origin.example.com",
            "public_url": "https://public.example.com/blog",
            "max_body_size": 1024
        }"#;
        let config = FilterConfig::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(config.origin_url, "https://origin.example.com");
        assert_eq!(config.max_body_size, 1024);
        assert_eq!(config.client_ip_header, "cf-connecting-ip");
        assert_eq!(config.rewrite_response_headers, vec!["link"]);
        assert!(!config.legacy_host_port_suffix);
        assert!(config.log_rewrites);
    }

    #[test]
    fn test_missing_urls_rejected() {
        let json = r#"{"public_url": "https://public.example.com"}"#;
        let result = FilterConfig::from_bytes(json.as_bytes());
        assert!(matches!(result, Err(ConfigError::InvalidJson(_))));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let json = r#"{"origin_url": "not a url", "public_url": "https://public.example.com"}"#;
        let result = FilterConfig::from_bytes(json.as_bytes());
        assert!(matches!(
            result,
            Err(ConfigError::InvalidUrl { field: "origin_url", .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let result = FilterConfig::from_bytes(&[0xff, 0xfe]);
        assert!(matches!(result, Err(ConfigError::InvalidUtf8(_))));
    }

    #[test]
    fn test_rewrites_response_header_case_insensitive() {
        let config = FilterConfig {
            rewrite_response_headers: vec!["Link".to_string(), "location".to_string()],
            ..FilterConfig::new("https://a.example", "https://b.example")
        };
        assert!(config.rewrites_response_header("link"));
        assert!(config.rewrites_response_header("LOCATION"));
        assert!(!config.rewrites_response_header("content-type"));
    }

    #[test]
    fn test_legacy_port_suffix() {
        let json = r#"{
            "origin_url": "https://origin.example.com",
            "public_url": "https://public.example.com",
            "legacy_host_port_suffix": true
        }"#;
        let config = FilterConfig::from_bytes(json.as_bytes()).unwrap();
        assert_eq!(config.port_suffix(), PortSuffix::Always);
        assert_eq!(
            FilterConfig::new("https://a.example", "https://b.example").port_suffix(),
            PortSuffix::Explicit
        );
    }
}
