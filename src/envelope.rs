//! Success envelope defaults and the error renderer.
//!
//! Successful outputs are merged with `{"code":"0","message":"ok"}` so routes need not
//! repeat them; keys the output already carries win. Outputs that are not JSON objects
//! are returned untouched. Every failure renders as the flat
//! two-field document `{"code":"1","message":"<error text>"}`.

use crate::defaults::DefaultSet;
use crate::pipeline::{Exchange, PipelineError, Renderer};
use crate::runtime_config::EnvelopeConfig;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    config: EnvelopeConfig,
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(EnvelopeConfig::default())
    }
}

impl Envelope {
    #[must_use]
    pub fn new(config: EnvelopeConfig) -> Self {
        Self { config }
    }

    /// Defaults merged into every successful output by the pack stage.
    #[must_use]
    pub fn success_defaults(&self) -> DefaultSet {
        DefaultSet::from_document(&json!({
            "code": self.config.code,
            "message": self.config.message,
        }))
    }

    /// `{"code":<error_code>,"message":<message>}`
    #[must_use]
    pub fn error_body(&self, message: &str) -> Vec<u8> {
        json!({
            "code": self.config.error_code,
            "message": message,
        })
        .to_string()
        .into_bytes()
    }

    /// Pipeline renderer writing the error envelope.
    #[must_use]
    pub fn renderer(&self) -> Renderer<Exchange> {
        let envelope = self.clone();
        Arc::new(move |_ex: &Exchange, err: &PipelineError| envelope.error_body(&err.error.to_string()))
    }
}
