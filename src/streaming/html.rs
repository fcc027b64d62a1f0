//! Streaming HTML body rewriter
//!
//! Wraps one `lol_html` rewriter per response. Body chunks from Envoy are
//! written in as they arrive; whatever the tokenizer has released is drained
//! and handed back so it can replace the chunk downstream. Attribute values
//! are rewritten in place, `<script>`/`<style>` text goes through a
//! [`TextNodeSlot`] so that a rule split across chunks still matches.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::html_content::{ContentType, Element, TextChunk};
use lol_html::{element, text, HandlerResult, HtmlRewriter, OutputSink, Settings};

use crate::dispatch::{Binding, HTML_TARGETS};
use crate::rewrite::{Emission, Ruleset, TextNodeSlot};

/// Output sink shared between the rewriter and the stream that drains it
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl OutputSink for SharedSink {
    fn handle_chunk(&mut self, chunk: &[u8]) {
        self.0.borrow_mut().extend_from_slice(chunk);
    }
}

impl SharedSink {
    fn drain(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

/// Rewrite one attribute if it is present and non-empty
fn rewrite_attribute(el: &mut Element, name: &str, ruleset: &Ruleset) -> HandlerResult {
    if let Some(value) = el.get_attribute(name) {
        if !value.is_empty() {
            el.set_attribute(name, &ruleset.rewrite(&value))?;
        }
    }
    Ok(())
}

/// Apply an accumulator decision to the fragment the tokenizer handed us
fn apply_emission(chunk: &mut TextChunk, emission: Emission) {
    match emission {
        Emission::Suppress => chunk.remove(),
        // Already valid markup, must not be escaped again
        Emission::Replace(text) => chunk.replace(&text, ContentType::Html),
    }
}

fn build_settings(ruleset: &Rc<Ruleset>) -> Settings<'static, 'static> {
    let element_content_handlers = HTML_TARGETS
        .iter()
        .map(|target| match target.binding {
            Binding::Attribute(name) => {
                let ruleset = Rc::clone(ruleset);
                element!(target.selector, move |el| rewrite_attribute(el, name, &ruleset))
            }
            Binding::Text => {
                let mut slot = TextNodeSlot::new(Rc::clone(ruleset));
                text!(target.selector, move |chunk| {
                    let emission = slot.push(chunk.as_str(), chunk.last_in_text_node());
                    apply_emission(chunk, emission);
                    Ok(())
                })
            }
        })
        .collect();

    Settings {
        element_content_handlers,
        ..Settings::default()
    }
}

/// Per-response HTML rewriting state
pub struct HtmlBodyStream {
    rewriter: Option<HtmlRewriter<'static, SharedSink>>,
    sink: SharedSink,
    bytes_in: usize,
    bytes_out: usize,
}

impl HtmlBodyStream {
    /// Wire a fresh rewriter for one response
    pub fn new(ruleset: Rc<Ruleset>) -> Self {
        let sink = SharedSink::default();
        let rewriter = HtmlRewriter::new(build_settings(&ruleset), sink.clone());

        Self {
            rewriter: Some(rewriter),
            sink,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Feed a body chunk, returning the output released so far
    pub fn write(&mut self, chunk: &[u8]) -> Result<Vec<u8>, HtmlStreamError> {
        let rewriter = self.rewriter.as_mut().ok_or(HtmlStreamError::Finished)?;
        self.bytes_in += chunk.len();

        if let Err(e) = rewriter.write(chunk) {
            self.rewriter = None;
            return Err(HtmlStreamError::Rewriting(e.to_string()));
        }

        Ok(self.drain())
    }

    /// Flush the tokenizer at end of stream, returning the remaining output
    pub fn end(&mut self) -> Result<Vec<u8>, HtmlStreamError> {
        let rewriter = self.rewriter.take().ok_or(HtmlStreamError::Finished)?;
        rewriter
            .end()
            .map_err(|e| HtmlStreamError::Rewriting(e.to_string()))?;

        Ok(self.drain())
    }

    fn drain(&mut self) -> Vec<u8> {
        let out = self.sink.drain();
        self.bytes_out += out.len();
        out
    }

    /// Body bytes received from upstream
    pub fn bytes_in(&self) -> usize {
        self.bytes_in
    }

    /// Body bytes released downstream
    pub fn bytes_out(&self) -> usize {
        self.bytes_out
    }
}

/// HTML streaming errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlStreamError {
    Rewriting(String),
    Finished,
}

impl std::fmt::Display for HtmlStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HtmlStreamError::Rewriting(e) => write!(f, "HTML rewriting failed: {}", e),
            HtmlStreamError::Finished => write!(f, "HTML stream already finished"),
        }
    }
}

impl std::error::Error for HtmlStreamError {}
