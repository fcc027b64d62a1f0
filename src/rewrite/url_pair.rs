//! Origin/public URL pair
//!
//! Both sides are parsed once from configuration and decomposed into the
//! pieces the ruleset and the request rewrite need. Serialized forms have
//! their trailing `/` trimmed so that joining a site-relative path never
//! produces a double slash.

use url::Url;

use crate::config::ConfigError;

/// One side of the pair, decomposed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    href: String,
}

impl Endpoint {
    fn parse(field: &'static str, raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
            field,
            reason: e.to_string(),
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost(field))?
            .to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
            path: url.path().trim_end_matches('/').to_string(),
            href: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// URL scheme without the `:` (`https`)
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Hostname without port
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port; `None` when the scheme default applies
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Path prefix, empty for a root URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full serialized URL
    pub fn href(&self) -> &str {
        &self.href
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// `scheme://host[:port]/path`, the prefix prepended to site-relative paths
    pub fn prefix(&self) -> String {
        format!("{}{}", self.origin(), self.path)
    }
}

/// The backend URL and the URL clients see
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlPair {
    pub origin: Endpoint,
    pub public: Endpoint,
}

impl UrlPair {
    pub fn parse(origin_url: &str, public_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: Endpoint::parse("origin_url", origin_url)?,
            public: Endpoint::parse("public_url", public_url)?,
        })
    }
}
