//! Whole-body rewriter for CSS, JS and plain text
//!
//! Envoy keeps buffering the body while the filter answers
//! `Action::Pause`, so this type only tracks how much is held and decides
//! when the complete body can be rewritten. Bodies larger than the
//! configured limit are released untouched (fail-open).

use std::rc::Rc;

use crate::rewrite::Ruleset;

/// Decision for one body callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyDecision {
    /// Keep buffering - more chunks expected
    Buffer,
    /// Complete body available, rewrite it now
    Rewrite,
    /// Stop buffering and pass the body through unmodified
    Skip(&'static str),
    /// A terminal decision was already made, let remaining chunks through
    Release,
}

/// Buffered rewriting for one text response
pub struct TextBodyRewriter {
    ruleset: Rc<Ruleset>,
    max_body_size: usize,
    /// Set once a terminal decision has been made
    complete: bool,
}

impl TextBodyRewriter {
    pub fn new(ruleset: Rc<Ruleset>, max_body_size: usize) -> Self {
        Self {
            ruleset,
            max_body_size,
            complete: false,
        }
    }

    /// Called for every body callback with the total size Envoy has buffered
    pub fn on_body(&mut self, buffered_size: usize, end_of_stream: bool) -> BodyDecision {
        if self.complete {
            return BodyDecision::Release;
        }

        if buffered_size > self.max_body_size {
            self.complete = true;
            return BodyDecision::Skip("Body exceeds max size");
        }

        if !end_of_stream {
            return BodyDecision::Buffer;
        }

        self.complete = true;
        BodyDecision::Rewrite
    }

    /// Decode the full body as UTF-8 (lossy) and rewrite it once
    pub fn rewrite(&self, body: &[u8]) -> String {
        self.ruleset.rewrite(&String::from_utf8_lossy(body))
    }

}
