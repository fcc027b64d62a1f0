//! Content-type dispatch
//!
//! Responses are classified once, from the declared `content-type`, before
//! any body bytes are seen. HTML goes through the streaming rewriter wired
//! from [`HTML_TARGETS`], other rewritable text is buffered and rewritten
//! whole, everything else passes through untouched.

use serde::Serialize;

/// Which body pipeline a response takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentClass {
    /// `text/html*`, streamed through the HTML rewriter
    Html,
    /// CSS, JS, plain text, rewritten in one pass
    Text,
    /// Passed through byte-for-byte
    Opaque,
}

impl ContentClass {
    /// Classify a `content-type` header value
    pub fn classify(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return ContentClass::Opaque;
        };
        let ct_lower = content_type.trim().to_ascii_lowercase();

        if ct_lower.starts_with("text/html") {
            ContentClass::Html
        } else if ct_lower.starts_with("text/")
            || ct_lower.starts_with("application/x-javascript")
            || ct_lower.starts_with("application/javascript")
        {
            ContentClass::Text
        } else {
            ContentClass::Opaque
        }
    }

    /// Whether the body is modified (and its length may change)
    pub fn rewrites_body(&self) -> bool {
        !matches!(self, ContentClass::Opaque)
    }
}

/// What part of a matched element is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A single attribute value, rewritten in place
    Attribute(&'static str),
    /// The element's text content, buffered per text node
    Text,
}

/// One entry of the HTML wiring table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteTarget {
    pub selector: &'static str,
    pub binding: Binding,
}

const fn attribute(selector: &'static str, name: &'static str) -> RewriteTarget {
    RewriteTarget {
        selector,
        binding: Binding::Attribute(name),
    }
}

const fn text(selector: &'static str) -> RewriteTarget {
    RewriteTarget {
        selector,
        binding: Binding::Text,
    }
}

/// Elements the HTML rewriter touches
pub const HTML_TARGETS: &[RewriteTarget] = &[
    attribute("a", "href"),
    attribute("form", "action"),
    attribute("img", "src"),
    attribute("img", "srcset"),
    attribute("link", "href"),
    attribute("meta", "content"),
    attribute("script", "src"),
    text("script"),
    text("style"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_html() {
        assert_eq!(ContentClass::classify(Some("text/html")), ContentClass::Html);
        assert_eq!(
            ContentClass::classify(Some("Text/HTML; charset=UTF-8")),
            ContentClass::Html
        );
    }

    #[test]
    fn test_classify_text() {
        for ct in [
            "text/css",
            "text/plain; charset=utf-8",
            "text/javascript",
            "application/javascript",
            "application/x-javascript; charset=utf-8",
        ] {
            assert_eq!(ContentClass::classify(Some(ct)), ContentClass::Text, "{ct}");
        }
    }

    #[test]
    fn test_classify_opaque() {
        assert_eq!(ContentClass::classify(Some("image/png")), ContentClass::Opaque);
        assert_eq!(ContentClass::classify(Some("application/json")), ContentClass::Opaque);
        assert_eq!(ContentClass::classify(None), ContentClass::Opaque);
        assert!(!ContentClass::Opaque.rewrites_body());
    }

    #[test]
    fn test_targets_cover_script_and_style_text() {
        let text_selectors: Vec<&str> = HTML_TARGETS
            .iter()
            .filter(|t| t.binding == Binding::Text)
            .map(|t| t.selector)
            .collect();
        assert_eq!(text_selectors, vec!["script", "style"]);
        assert!(HTML_TARGETS.contains(&attribute("img", "srcset")));
    }
}
