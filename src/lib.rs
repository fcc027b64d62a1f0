//! Origin Rewrite Wasm Filter for Envoy Proxy
//!
//! Serves an origin site under a public host/path. Envoy performs the
//! upstream fetch; this filter rewrites the request on the way out and every
//! origin reference in the response on the way back: selected headers,
//! CSS/JS/text bodies (buffered, rewritten once) and HTML bodies (streamed
//! through `lol_html`, buffered only inside `<script>`/`<style>` text).
//!
//! Targets: wasm32-wasi (Envoy proxy-wasm ABI)

pub mod config;
pub mod dispatch;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod streaming;
pub mod telemetry;

use log::{debug, info, warn};
use proxy_wasm::traits::{Context, HttpContext, RootContext};
use proxy_wasm::types::{Action, ContextType, LogLevel};
use std::rc::Rc;

use config::FilterConfig;
use dispatch::ContentClass;
use request::{LocalReply, RequestPlan};
use rewrite::{Ruleset, UrlPair};
use streaming::{BodyDecision, HtmlBodyStream, HtmlStreamError, TextBodyRewriter};
use telemetry::AuditEvent;

/// Validated configuration shared by every request of this VM
struct FilterState {
    config: FilterConfig,
    pair: UrlPair,
}

/// Root context for filter lifecycle management
struct RewriteRootContext {
    state: Option<Rc<FilterState>>,
}

impl RewriteRootContext {
    fn new() -> Self {
        Self { state: None }
    }
}

impl Context for RewriteRootContext {}

impl RootContext for RewriteRootContext {
    fn on_configure(&mut self, _plugin_configuration_size: usize) -> bool {
        let Some(config_bytes) = self.get_plugin_configuration() else {
            warn!("Missing filter configuration: origin_url and public_url are required");
            return false;
        };

        let loaded = FilterConfig::from_bytes(&config_bytes)
            .and_then(|config| config.url_pair().map(|pair| FilterState { config, pair }));

        match loaded {
            Ok(state) => {
                info!(
                    "Origin Rewrite Filter initialized: {} -> {}",
                    state.pair.origin.href(),
                    state.pair.public.href()
                );
                self.state = Some(Rc::new(state));
                true
            }
            Err(e) => {
                warn!("Rejecting filter configuration: {}", e);
                false
            }
        }
    }

    fn create_http_context(&self, context_id: u32) -> Option<Box<dyn HttpContext>> {
        let state = self.state.as_ref()?;
        Some(Box::new(RewriteHttpContext::new(context_id, Rc::clone(state))))
    }

    fn get_type(&self) -> Option<ContextType> {
        Some(ContextType::HttpContext)
    }
}

/// Response body pipeline chosen at response-header time
#[derive(Default)]
enum BodyPipeline {
    /// Response headers not seen yet
    #[default]
    Pending,
    Html(HtmlBodyStream),
    Text(TextBodyRewriter),
    Passthrough,
}

/// HTTP context for per-request processing
struct RewriteHttpContext {
    context_id: u32,
    state: Rc<FilterState>,
    /// Rules for this request only
    ruleset: Rc<Ruleset>,
    body: BodyPipeline,
    class: Option<ContentClass>,
}

impl RewriteHttpContext {
    fn new(context_id: u32, state: Rc<FilterState>) -> Self {
        let ruleset = Rc::new(Ruleset::new(&state.pair, state.config.port_suffix()));

        Self {
            context_id,
            state,
            ruleset,
            body: BodyPipeline::Pending,
            class: None,
        }
    }

    fn audit(&self, event: AuditEvent) {
        if self.state.config.log_rewrites {
            event.with_context_id(self.context_id).emit();
        }
    }

    fn send_local_reply(&self, reply: &LocalReply) {
        let headers = reply
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        self.send_http_response(reply.status, headers, Some(reply.body.as_bytes()));
    }

    fn on_html_chunk(
        &self,
        stream: &mut HtmlBodyStream,
        body_size: usize,
        end_of_stream: bool,
    ) -> Result<(), HtmlStreamError> {
        let chunk = self.get_http_response_body(0, body_size).unwrap_or_default();

        let mut out = stream.write(&chunk)?;
        if end_of_stream {
            out.extend(stream.end()?);
        }

        debug!(
            "[context_id={}] HTML chunk: {} bytes in, {} bytes out, end_of_stream: {}",
            self.context_id,
            chunk.len(),
            out.len(),
            end_of_stream
        );
        self.set_http_response_body(0, body_size, &out);
        Ok(())
    }

    fn on_text_body(
        &self,
        rewriter: &mut TextBodyRewriter,
        body_size: usize,
        end_of_stream: bool,
    ) -> Action {
        match rewriter.on_body(body_size, end_of_stream) {
            BodyDecision::Buffer => {
                debug!(
                    "[context_id={}] Buffering text body, total buffered: {} bytes",
                    self.context_id, body_size
                );
                Action::Pause
            }
            BodyDecision::Rewrite => {
                let body = self.get_http_response_body(0, body_size).unwrap_or_default();
                let rewritten = rewriter.rewrite(&body);
                self.set_http_response_body(0, body_size, rewritten.as_bytes());
                self.audit(telemetry::audit_rewritten(
                    ContentClass::Text,
                    body.len(),
                    rewritten.len(),
                ));
                Action::Continue
            }
            BodyDecision::Skip(reason) => {
                warn!(
                    "[context_id={}] Passing text body through unmodified: {}",
                    self.context_id, reason
                );
                self.audit(telemetry::audit_passthrough(ContentClass::Text, reason));
                Action::Continue
            }
            BodyDecision::Release => Action::Continue,
        }
    }
}

impl Context for RewriteHttpContext {}

impl HttpContext for RewriteHttpContext {
    fn on_http_request_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        let headers = self.get_http_request_headers();
        let config = &self.state.config;

        match request::plan(&headers, &self.state.pair, &config.client_ip_header) {
            Ok(RequestPlan::Reject(reply)) => {
                let method = headers
                    .iter()
                    .find(|(n, _)| n == ":method")
                    .map(|(_, v)| v.as_str())
                    .unwrap_or_default();
                self.audit(telemetry::audit_rejected(method));
                self.send_local_reply(&reply);
                Action::Pause
            }
            Ok(RequestPlan::Forward(upstream)) => {
                debug!(
                    "[context_id={}] Proxying to {}",
                    self.context_id, upstream.url
                );
                for (name, value) in &upstream.set_headers {
                    self.set_http_request_header(name, Some(value.as_str()));
                }
                for name in &upstream.remove_headers {
                    self.set_http_request_header(name, None);
                }
                self.audit(telemetry::audit_forwarded(&upstream.url));
                Action::Continue
            }
            Err(e) => {
                warn!("[context_id={}] {}", self.context_id, e);
                self.send_http_response(500, vec![], Some(b"Invalid proxied URL.".as_slice()));
                Action::Pause
            }
        }
    }

    fn on_http_response_headers(&mut self, _num_headers: usize, _end_of_stream: bool) -> Action {
        let head = response::rewrite_head(
            self.get_http_response_headers(),
            &self.ruleset,
            &self.state.config,
        );

        let headers = head
            .headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        self.set_http_response_headers(headers);

        debug!(
            "[context_id={}] Response classified as {:?}",
            self.context_id, head.class
        );
        self.class = Some(head.class);

        self.body = match head.class {
            ContentClass::Html => {
                BodyPipeline::Html(HtmlBodyStream::new(Rc::clone(&self.ruleset)))
            }
            ContentClass::Text => BodyPipeline::Text(TextBodyRewriter::new(
                Rc::clone(&self.ruleset),
                self.state.config.max_body_size,
            )),
            ContentClass::Opaque => BodyPipeline::Passthrough,
        };

        Action::Continue
    }

    fn on_http_response_body(&mut self, body_size: usize, end_of_stream: bool) -> Action {
        let mut body = std::mem::take(&mut self.body);
        let mut failed = false;

        let action = match &mut body {
            BodyPipeline::Pending | BodyPipeline::Passthrough => Action::Continue,
            BodyPipeline::Html(stream) => {
                match self.on_html_chunk(stream, body_size, end_of_stream) {
                    Ok(()) => {
                        if end_of_stream {
                            self.audit(telemetry::audit_rewritten(
                                ContentClass::Html,
                                stream.bytes_in(),
                                stream.bytes_out(),
                            ));
                        }
                        Action::Continue
                    }
                    Err(e) => {
                        // Headers are already downstream, nothing to salvage
                        warn!("[context_id={}] {}", self.context_id, e);
                        self.audit(telemetry::audit_failed(ContentClass::Html, &e.to_string()));
                        self.reset_http_response();
                        failed = true;
                        Action::Pause
                    }
                }
            }
            BodyPipeline::Text(rewriter) => self.on_text_body(rewriter, body_size, end_of_stream),
        };

        self.body = if failed { BodyPipeline::Passthrough } else { body };
        action
    }

    fn on_log(&mut self) {
        match self.class {
            Some(class) if !class.rewrites_body() => {
                self.audit(telemetry::audit_passthrough(
                    class,
                    "Opaque content type or encoding",
                ));
            }
            _ => {
                debug!(
                    "[context_id={}] Request processing complete",
                    self.context_id
                );
            }
        }
    }
}

// Register the filter with proxy-wasm runtime
proxy_wasm::main! {{
    proxy_wasm::set_log_level(LogLevel::Debug);
    proxy_wasm::set_root_context(|_| -> Box<dyn RootContext> {
        Box::new(RewriteRootContext::new())
    });
}}
