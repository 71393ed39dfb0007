//! # apistream
//!
//! **apistream** runs every API call through the same schema-driven pipeline. An API is a
//! Rust type that names its route, declares its request and response shapes as
//! *line schemas* and implements one business function. Everything around that function
//! is derived from the schemas once, at registration:
//!
//! 1. **merge defaults** - fill absent request fields from their declared defaults
//! 2. **validate input** - check the request against the derived JSON Schema
//! 3. **coerce input** - turn query-string text such as `"10"` into `10`
//! 4. **unmarshal** - deserialize the document into a fresh handler instance
//! 5. **invoke** - call the business function
//! 6. **marshal** - serialize its output
//! 7. **format output** - project the output onto the fields the response schema names
//! 8. **validate output** - check the response (can be switched off)
//! 9. **pack** - add the `{"code":"0","message":"ok"}` success envelope
//!
//! The first failing stage stops the run; its error renders as
//! `{"code":"1","message":"..."}`.
//!
//! ## Architecture
//!
//! - **[`lineschema`]** - line-schema parsing and JSON Schema derivation
//! - **[`schema`]** - compilation into a [`CompiledSchema`] and the compile-once cache
//! - **[`validator`]**, **[`coerce`]**, **[`defaults`]**, **[`projection`]** - the
//!   per-stage transformations
//! - **[`pipeline`]** - ordered, short-circuiting stage runner
//! - **[`handler`]** - the [`Api`] contract and per-request instances
//! - **[`registry`]** - concurrent route table
//! - **[`adapter`]**, **[`auth`]**, **[`service`]** - the HTTP boundary
//! - **[`context`]** - request id, user, cancellation and the run log
//! - **[`runtime_config`]**, **[`telemetry`]**, **[`cli`]** - configuration, logging and
//!   the `apistream` tool
//!
//! ## Quick Start
//!
//! ```rust
//! use apistream::{Api, ApiError, Registry, RequestContext, RouteKey};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! #[serde(default)]
//! struct Echo {
//!     word: String,
//! }
//!
//! #[derive(Serialize)]
//! struct EchoOut {
//!     word: String,
//! }
//!
//! impl Api for Echo {
//!     type Output = EchoOut;
//!
//!     fn route(&self) -> RouteKey {
//!         RouteKey::get("/echo")
//!     }
//!
//!     fn input_schema(&self) -> &str {
//!         "fullname=word,required,default=hello"
//!     }
//!
//!     fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<EchoOut>, ApiError> {
//!         Ok(Some(EchoOut { word: self.word.clone() }))
//!     }
//! }
//!
//! let registry = Registry::new();
//! registry.register(Echo::default())?;
//! let mut invocation = registry.resolve("GET", "/echo")?;
//! let body: serde_json::Value = serde_json::from_slice(&invocation.run(RequestContext::new(), b"{}"))?;
//! assert_eq!(body, serde_json::json!({"code": "0", "message": "ok", "word": "hello"}));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod adapter;
pub mod auth;
pub mod cli;
pub mod coerce;
pub mod context;
pub mod defaults;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod lineschema;
pub mod pipeline;
pub mod projection;
pub mod registry;
pub mod runtime_config;
pub mod schema;
pub mod service;
pub mod telemetry;
pub mod validator;

pub use context::{Cancellation, RequestContext, RequestId};
pub use error::{ApiError, SchemaCompileError};
pub use handler::{Api, ApiConfig, ApiProfile, RouteKey};
pub use registry::{Invocation, Registry};
pub use schema::CompiledSchema;
pub use service::ApiService;
