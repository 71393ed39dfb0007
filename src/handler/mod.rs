//! # Handler Module
//!
//! The surface a business-logic author implements.
//!
//! ## Overview
//!
//! An API is a plain struct: its fields are the request fields, it declares its route and
//! line schemas, and [`Api::handle`] reads the populated fields and returns the output.
//!
//! ```rust
//! use apistream::context::RequestContext;
//! use apistream::error::ApiError;
//! use apistream::handler::{Api, RouteKey};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Deserialize)]
//! #[serde(default)]
//! struct AdList {
//!     title: String,
//!     index: i64,
//!     size: i64,
//! }
//!
//! #[derive(Serialize)]
//! struct AdListOut {
//!     total: i64,
//! }
//!
//! impl Api for AdList {
//!     type Output = AdListOut;
//!
//!     fn route(&self) -> RouteKey {
//!         RouteKey::new("POST", "/api/v1/adList")
//!     }
//!
//!     fn input_schema(&self) -> &str {
//!         "fullname=title,required\nfullname=index,format=int,default=0\nfullname=size,format=int,default=10"
//!     }
//!
//!     fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<AdListOut>, ApiError> {
//!         Ok(Some(AdListOut { total: self.size }))
//!     }
//! }
//! ```
//!
//! ## Per-request instances
//!
//! The value passed to [`Registry::register`](crate::registry::Registry::register) is a
//! prototype: only its route, schemas, profile and config are read. Every request gets a
//! fresh `T::default()` wrapped in an [`Instance`], so requests never share handler state.
//! The unmarshal stage replaces that default with the formatted input, which is why
//! request structs usually carry `#[serde(default)]`.
//!
//! ## Returning nothing
//!
//! `Ok(None)` from [`Api::handle`] is success without an output object. The pipeline
//! rejects it with [`ApiError::NilOutput`](crate::error::ApiError::NilOutput).

mod core;

pub use core::*;
