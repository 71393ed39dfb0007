//! # Schema Module
//!
//! Compiles line-schema text into the immutable per-route artifact every pipeline stage
//! reads from, and caches those artifacts so identical schema text is compiled once.
//!
//! ## Overview
//!
//! A [`CompiledSchema`] holds everything derived from one line schema for one direction:
//!
//! - the derived JSON Schema document and its compiled validator
//! - the typed default document ([`DefaultSet`](crate::defaults::DefaultSet))
//! - the coercion path table ([`CoercionTable`](crate::coerce::CoercionTable))
//! - the output projection, for `out` schemas
//!
//! Artifacts are built at registration time and shared read-only (`Arc`) across all
//! requests for a route. Nothing on the request path mutates them.
//!
//! ## Declining validation
//!
//! A route may supply an empty schema for either direction. [`compile_optional`] turns
//! blank text into an artifact without a validator, defaults or coercions; every stage
//! built from it is a pass-through.
//!
//! ## Caching
//!
//! [`SchemaCache`] keys artifacts by direction and a SHA-256 fingerprint of the schema
//! text. Disable it with `APISTREAM_SCHEMA_CACHE=off` to give every route its own copy.

mod cache;
mod compiler;

pub use cache::{fingerprint, SchemaCache};
pub use compiler::{compile, compile_optional, CompiledSchema};
