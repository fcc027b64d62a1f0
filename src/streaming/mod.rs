//! Streaming body pipelines
//!
//! This module provides the two rewriting branches:
//! - HTML: tokenized as chunks arrive, emitted incrementally
//! - Text (CSS/JS/plain): buffered to end of stream, rewritten once

pub mod html;
pub mod text_body;

pub use html::{HtmlBodyStream, HtmlStreamError};
pub use text_body::{BodyDecision, TextBodyRewriter};
