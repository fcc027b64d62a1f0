//! Request-side handling
//!
//! Turns the inbound request headers (Envoy pseudo-headers included) into
//! either a local reply or the header changes for the upstream request.
//! Pure so it can be tested without a host.

use url::Url;

use crate::rewrite::UrlPair;

/// The only method the proxy serves
pub const ALLOWED_METHOD: &str = "GET";

/// A response generated by the filter without contacting upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReply {
    pub status: u32,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl LocalReply {
    pub fn method_not_allowed(method: &str) -> Self {
        Self {
            status: 405,
            headers: vec![("allow".to_string(), ALLOWED_METHOD.to_string())],
            body: format!("Method {} not allowed.", method),
        }
    }
}

/// Header changes for the proxied request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Full URL the request is proxied to
    pub url: String,
    /// Headers to set, pseudo-headers included
    pub set_headers: Vec<(&'static str, String)>,
    /// Headers to drop
    pub remove_headers: Vec<&'static str>,
}

/// What to do with an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    Reject(LocalReply),
    Forward(UpstreamRequest),
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// The inbound URL with the public prefix replaced, textually, by the origin
pub fn proxied_url(inbound_url: &str, pair: &UrlPair) -> Result<Url, RequestError> {
    let rewritten = inbound_url.replacen(pair.public.href(), pair.origin.href(), 1);
    Url::parse(&rewritten).map_err(|e| RequestError::InvalidUrl {
        url: rewritten.clone(),
        reason: e.to_string(),
    })
}

/// Decide how to handle an inbound request
pub fn plan(
    headers: &[(String, String)],
    pair: &UrlPair,
    client_ip_header: &str,
) -> Result<RequestPlan, RequestError> {
    let method = header(headers, ":method").unwrap_or_default();
    if method != ALLOWED_METHOD {
        return Ok(RequestPlan::Reject(LocalReply::method_not_allowed(method)));
    }

    let inbound_url = format!(
        "{}://{}{}",
        header(headers, ":scheme").unwrap_or(pair.public.scheme()),
        header(headers, ":authority").unwrap_or(pair.public.host()),
        header(headers, ":path").unwrap_or("/"),
    );
    let url = proxied_url(&inbound_url, pair)?;

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let client_ip = header(headers, client_ip_header).unwrap_or_default();

    Ok(RequestPlan::Forward(UpstreamRequest {
        url: url.to_string(),
        set_headers: vec![
            (":authority", pair.origin.host().to_string()),
            (":path", path),
            ("x-forwarded-host", pair.public.host().to_string()),
            ("x-forwarded-proto", pair.public.scheme().to_string()),
            ("x-forwarded-for", client_ip.to_string()),
        ],
        // Rewriting needs an identity-encoded body
        remove_headers: vec!["accept-encoding"],
    }))
}

/// Request preparation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    InvalidUrl { url: String, reason: String },
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvalidUrl { url, reason } => {
                write!(f, "Invalid proxied URL '{}': {}", url, reason)
            }
        }
    }
}

impl std::error::Error for RequestError {}
