//! Response header handling
//!
//! Runs once per response, before any body bytes: classifies the body,
//! strips `x-robots-tag`, rewrites configured headers (`link` by default)
//! and drops `content-length` when the body is going to change size.
//! Bodies with a non-identity `content-encoding` are never rewritten.

use crate::config::FilterConfig;
use crate::dispatch::ContentClass;
use crate::rewrite::Ruleset;

/// Always removed from responses
pub const ROBOTS_HEADER: &str = "x-robots-tag";

/// Rewritten response head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub class: ContentClass,
    pub headers: Vec<(String, String)>,
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Any `content-encoding` other than `identity`
fn is_encoded(content_encoding: Option<&str>) -> bool {
    content_encoding
        .map(str::trim)
        .is_some_and(|e| !e.is_empty() && !e.eq_ignore_ascii_case("identity"))
}

/// Classify the response and compute its outgoing headers
pub fn rewrite_head(
    headers: Vec<(String, String)>,
    ruleset: &Ruleset,
    config: &FilterConfig,
) -> ResponseHead {
    let class = if is_encoded(find_header(&headers, "content-encoding")) {
        // Compressed bytes cannot be rewritten as text
        ContentClass::Opaque
    } else {
        ContentClass::classify(find_header(&headers, "content-type"))
    };

    let headers = headers
        .into_iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case(ROBOTS_HEADER)
                && !(class.rewrites_body() && name.eq_ignore_ascii_case("content-length"))
        })
        .map(|(name, value)| {
            let value = if config.rewrites_response_header(&name) {
                ruleset.rewrite(&value)
            } else {
                value
            };
            (name, value)
        })
        .collect();

    ResponseHead { class, headers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::PortSuffix;
    use crate::streaming::HtmlBodyStream;
    use std::rc::Rc;

    impl ResponseHead {
        fn header(&self, name: &str) -> Option<&str> {
            find_header(&self.headers, name)
        }
    }

    fn setup() -> (Ruleset, FilterConfig) {
        let config =
            FilterConfig::new("https://origin.example.com", "https://public.example.com/blog");
        let ruleset = Ruleset::new(&config.url_pair().unwrap(), PortSuffix::Explicit);
        (ruleset, config)
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_html_response() {
        let (ruleset, config) = setup();
        let head = rewrite_head(
            headers(&[
                (":status", "200"),
                ("content-type", "text/html; charset=utf-8"),
                ("content-length", "120"),
                ("X-Robots-Tag", "noindex"),
                ("link", "<https://origin.example.com/wp-json/>; rel=\"https://api.w.org/\""),
            ]),
            &ruleset,
            &config,
        );

        assert_eq!(head.class, ContentClass::Html);
        assert_eq!(head.header(":status"), Some("200"));
        assert_eq!(head.header(ROBOTS_HEADER), None);
        assert_eq!(head.header("content-length"), None);
        assert_eq!(
            head.header("link"),
            Some("<https://public.example.com/blog/wp-json/>; rel=\"https://api.w.org/\"")
        );

        // Body for the same response
        let mut body = HtmlBodyStream::new(Rc::new(ruleset));
        let mut out = body
            .write(br#"<a href="https://origin.example.com/hello">hi</a>"#)
            .unwrap();
        out.extend(body.end().unwrap());
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<a href="https://public.example.com/blog/hello">hi</a>"#
        );
    }

    #[test]
    fn test_opaque_response_keeps_length() {
        let (ruleset, config) = setup();
        let head = rewrite_head(
            headers(&[
                ("content-type", "image/png"),
                ("content-length", "512"),
                ("x-robots-tag", "noindex"),
            ]),
            &ruleset,
            &config,
        );

        assert_eq!(head.class, ContentClass::Opaque);
        assert_eq!(head.header("content-length"), Some("512"));
        assert_eq!(head.header(ROBOTS_HEADER), None);
    }

    #[test]
    fn test_unlisted_headers_untouched() {
        let (ruleset, config) = setup();
        let head = rewrite_head(
            headers(&[
                ("content-type", "text/css"),
                ("location", "https://origin.example.com/moved"),
            ]),
            &ruleset,
            &config,
        );
        assert_eq!(head.class, ContentClass::Text);
        assert_eq!(head.header("location"), Some("https://origin.example.com/moved"));
    }

    #[test]
    fn test_configured_headers_rewritten() {
        let (ruleset, mut config) = setup();
        config.rewrite_response_headers.push("location".to_string());

        let head = rewrite_head(
            headers(&[("location", "https://origin.example.com/moved")]),
            &ruleset,
            &config,
        );
        assert_eq!(
            head.header("location"),
            Some("https://public.example.com/blog/moved")
        );
    }

    #[test]
    fn test_encoded_response_passthrough() {
        let (ruleset, config) = setup();
        let head = rewrite_head(
            headers(&[
                ("content-type", "text/css"),
                ("content-encoding", "gzip"),
                ("content-length", "6"),
                ("x-robots-tag", "noindex"),
                ("link", "<https://origin.example.com/a.css>; rel=preload"),
            ]),
            &ruleset,
            &config,
        );

        assert_eq!(head.class, ContentClass::Opaque);
        assert_eq!(head.header("content-length"), Some("6"));
        assert_eq!(head.header("content-encoding"), Some("gzip"));
        assert_eq!(head.header(ROBOTS_HEADER), None);
        // Headers are still rewritten, only the body is left alone
        assert_eq!(
            head.header("link"),
            Some("<https://public.example.com/blog/a.css>; rel=preload")
        );

        let html = rewrite_head(
            headers(&[("content-type", "text/html"), ("content-encoding", "br")]),
            &ruleset,
            &config,
        );
        assert_eq!(html.class, ContentClass::Opaque);
    }

    #[test]
    fn test_identity_encoding_still_rewritten() {
        let (ruleset, config) = setup();
        let head = rewrite_head(
            headers(&[
                ("content-type", "text/html"),
                ("content-encoding", "Identity"),
                ("content-length", "40"),
            ]),
            &ruleset,
            &config,
        );
        assert_eq!(head.class, ContentClass::Html);
        assert_eq!(head.header("content-length"), None);
    }
}
