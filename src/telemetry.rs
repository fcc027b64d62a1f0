//! Telemetry Module for the origin rewrite filter
//!
//! In Wasm, we emit structured logs that can be collected by
//! Envoy's access logging or external collectors.

use log::{info, warn};
use serde::Serialize;

use crate::dispatch::ContentClass;

/// Audit event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Non-GET request answered locally
    RequestRejected,
    /// Request sent to the origin
    RequestForwarded,
    /// Response body went through the ruleset
    ResponseRewritten,
    /// Response body passed through unmodified
    ResponsePassthrough,
    /// Rewriting failed and the response was reset
    RewriteFailed,
}

/// Audit event for logging
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event type
    pub event_type: AuditEventType,
    /// Envoy context ID of the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<u32>,
    /// Request method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Upstream URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    /// Body pipeline taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_class: Option<ContentClass>,
    /// Body bytes received from the origin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_in: Option<usize>,
    /// Body bytes sent to the client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_out: Option<usize>,
    /// Reason for action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            context_id: None,
            method: None,
            upstream_url: None,
            content_class: None,
            bytes_in: None,
            bytes_out: None,
            reason: None,
        }
    }

    pub fn with_context_id(mut self, id: u32) -> Self {
        self.context_id = Some(id);
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn with_upstream_url(mut self, url: &str) -> Self {
        self.upstream_url = Some(url.to_string());
        self
    }

    pub fn with_content_class(mut self, class: ContentClass) -> Self {
        self.content_class = Some(class);
        self
    }

    /// Set body byte counts
    pub fn with_bytes(mut self, bytes_in: usize, bytes_out: usize) -> Self {
        self.bytes_in = Some(bytes_in);
        self.bytes_out = Some(bytes_out);
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    /// Log the event
    pub fn emit(&self) {
        // Serialize to JSON for structured logging
        match serde_json::to_string(self) {
            Ok(json) => match self.event_type {
                AuditEventType::RequestRejected | AuditEventType::RewriteFailed => {
                    warn!("[ORIGIN-REWRITE-AUDIT] {}", json);
                }
                _ => {
                    info!("[ORIGIN-REWRITE-AUDIT] {}", json);
                }
            },
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
            }
        }
    }
}

/// Create a method-not-allowed audit event
pub fn audit_rejected(method: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestRejected)
        .with_method(method)
        .with_reason(&format!("Method {} not allowed", method))
}

/// Create a forwarded request audit event
pub fn audit_forwarded(upstream_url: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::RequestForwarded).with_upstream_url(upstream_url)
}

/// Create a rewritten body audit event
pub fn audit_rewritten(class: ContentClass, bytes_in: usize, bytes_out: usize) -> AuditEvent {
    AuditEvent::new(AuditEventType::ResponseRewritten)
        .with_content_class(class)
        .with_bytes(bytes_in, bytes_out)
}

/// Create a passthrough audit event
pub fn audit_passthrough(class: ContentClass, reason: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::ResponsePassthrough)
        .with_content_class(class)
        .with_reason(reason)
}

/// Create a failed rewrite audit event
pub fn audit_failed(class: ContentClass, error: &str) -> AuditEvent {
    AuditEvent::new(AuditEventType::RewriteFailed)
        .with_content_class(class)
        .with_reason(error)
}
