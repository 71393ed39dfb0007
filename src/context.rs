//! Per-request context handed to every pipeline stage and to the business function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Correlates the log lines of one request. Echoed back as `x-request-id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Keep the caller's id when it is a ULID; anything else gets a fresh one.
    #[must_use]
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|v| ulid::Ulid::from_string(v.trim()).ok())
            .map_or_else(Self::new, Self)
    }

    #[must_use]
    pub fn ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for RequestId {
    type Error = ulid::DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ulid::Ulid::from_string(&value).map(Self)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0.to_string()
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

const MAX_CAPTURE: usize = 4096;

fn capture(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= MAX_CAPTURE {
        return text.into_owned();
    }
    let mut end = MAX_CAPTURE;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Snapshots of the document as it moves through the stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunLog {
    pub input: Option<String>,
    /// The route's default document
    pub default_json: Option<String>,
    pub merged_default: Option<String>,
    pub formatted_input: Option<String>,
    pub original_out: Option<String>,
    pub out: Option<String>,
    pub error: Option<String>,
}

impl RunLog {
    pub fn record_input(&mut self, bytes: &[u8]) {
        self.input = Some(capture(bytes));
    }

    pub fn record_default_json(&mut self, bytes: &[u8]) {
        self.default_json = Some(capture(bytes));
    }

    pub fn record_merged_default(&mut self, bytes: &[u8]) {
        self.merged_default = Some(capture(bytes));
    }

    pub fn record_formatted_input(&mut self, bytes: &[u8]) {
        self.formatted_input = Some(capture(bytes));
    }

    pub fn record_original_out(&mut self, bytes: &[u8]) {
        self.original_out = Some(capture(bytes));
    }

    pub fn record_out(&mut self, bytes: &[u8]) {
        self.out = Some(capture(bytes));
    }

    pub fn record_error(&mut self, error: &dyn std::error::Error) {
        self.error = Some(error.to_string());
    }
}

/// Explicit request state. Created per request, never shared between requests.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Set by the auth boundary
    pub user_id: Option<String>,
    /// Declared API category (the profile's domain)
    pub category: Option<String>,
    pub cancellation: Cancellation,
    pub log: RunLog,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Emit the run log as one structured event.
    pub fn emit_run_log(&self, route: &str) {
        let log = &self.log;
        match &log.error {
            None => info!(
                request_id = %self.request_id,
                route = route,
                user_id = self.user_id.as_deref(),
                category = self.category.as_deref(),
                input = log.input.as_deref(),
                default_json = log.default_json.as_deref(),
                merged_default = log.merged_default.as_deref(),
                formatted_input = log.formatted_input.as_deref(),
                original_out = log.original_out.as_deref(),
                out = log.out.as_deref(),
                "API run completed"
            ),
            Some(error) => warn!(
                request_id = %self.request_id,
                route = route,
                user_id = self.user_id.as_deref(),
                category = self.category.as_deref(),
                input = log.input.as_deref(),
                merged_default = log.merged_default.as_deref(),
                formatted_input = log.formatted_input.as_deref(),
                error = %error,
                "API run failed"
            ),
        }
    }
}
