//! URL Rewrite Ruleset
//!
//! An ordered list of plain substring substitutions derived from a
//! [`UrlPair`]. Each rule runs on the output of the previous one, so the
//! order is part of the contract:
//!
//! 1. quote/tag delimited site-relative `/wp-content/` paths
//! 2. backslash-escaped origin (`https:\/\/host`) as found in JSON and JS
//! 3. the full origin URL
//! 4. any remaining bare origin hostname
//!
//! No regex and no URL parsing at rewrite time. Unrelated text that merely
//! contains the origin hostname as a substring is rewritten too.

use super::url_pair::UrlPair;

/// Site-relative asset path rewritten by the first rule
const ASSET_PATH: &str = "/wp-content/";

/// Characters accepted immediately before [`ASSET_PATH`]
const ASSET_PATH_DELIMITERS: [char; 3] = ['\'', '"', '<'];

/// How the bare-hostname rule renders the public port
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PortSuffix {
    /// Append `:<port>` only when the public URL has an explicit port
    #[default]
    Explicit,
    /// Always append `:<port>`, leaving a dangling `:` for default ports
    Always,
}

/// A single `(pattern, replacement)` substitution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pattern: String,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Replace every non-overlapping occurrence of the pattern
    fn apply(&self, text: String) -> String {
        if self.pattern.is_empty() || !text.contains(self.pattern.as_str()) {
            return text;
        }
        text.replace(self.pattern.as_str(), &self.replacement)
    }
}

/// Ordered rules for one origin/public pair
#[derive(Clone, Debug)]
pub struct Ruleset {
    rules: Vec<RewriteRule>,
}

impl Ruleset {
    pub fn new(pair: &UrlPair, port_suffix: PortSuffix) -> Self {
        let origin = &pair.origin;
        let public = &pair.public;
        let mut rules = Vec::with_capacity(ASSET_PATH_DELIMITERS.len() + 3);

        // 1. '/wp-content/ -> 'https://public/prefix/wp-content/
        let prefix = public.prefix();
        for delimiter in ASSET_PATH_DELIMITERS {
            rules.push(RewriteRule::new(
                format!("{delimiter}{ASSET_PATH}"),
                format!("{delimiter}{prefix}{ASSET_PATH}"),
            ));
        }

        // 2. https:\/\/origin -> https:\/\/public\/prefix
        rules.push(RewriteRule::new(
            escape_slashes(&origin.origin()),
            format!(
                "{}{}",
                escape_slashes(&public.origin()),
                escape_slashes(public.path())
            ),
        ));

        // 3. full URL
        rules.push(RewriteRule::new(origin.href(), public.href()));

        // 4. bare hostname
        let host = match (port_suffix, public.port()) {
            (_, Some(port)) => format!("{}:{}", public.host(), port),
            (PortSuffix::Always, None) => format!("{}:", public.host()),
            (PortSuffix::Explicit, None) => public.host().to_string(),
        };
        rules.push(RewriteRule::new(origin.host(), host));

        Self { rules }
    }

    /// Rewrite every origin reference in `text`
    pub fn rewrite(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(acc))
    }

    /// Like [`Ruleset::rewrite`]; absent input becomes an empty string
    pub fn rewrite_opt(&self, text: Option<&str>) -> String {
        text.map(|t| self.rewrite(t)).unwrap_or_default()
    }
}

fn escape_slashes(s: &str) -> String {
    s.replace('/', "\\/")
}
