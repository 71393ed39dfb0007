//! # Registry Module
//!
//! Process-scoped route table: `(method, path)` to a compiled route entry.
//!
//! ## Lifecycle
//!
//! 1. `Registry::new()` (or [`Registry::with_config`]) at startup
//! 2. [`Registry::register`] once per API; schema compile errors and duplicate routes are
//!    returned, [`Registry::must_register`] panics on them instead
//! 3. [`Registry::resolve`] per request; each call yields an [`Invocation`] owning a
//!    brand-new handler instance
//! 4. [`Registry::shutdown`] drops every route and cached schema
//!
//! Registration compiles both schemas (through the shared
//! [`SchemaCache`](crate::schema::SchemaCache)) and builds the route's pipeline once.
//! Entries are immutable after insertion, so resolving takes no lock beyond the
//! concurrent map's shard read.
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = Registry::new();
//! registry.must_register(AdList::default());
//!
//! let mut invocation = registry.resolve("POST", "/api/v1/adList")?;
//! let body = invocation.run(RequestContext::new(), br#"{"title":"promo"}"#);
//! ```

mod core;

pub use core::*;
