//! # Pipeline Module
//!
//! An ordered list of byte-transforming stages with first-error short-circuiting and a
//! single error renderer.
//!
//! ## Overview
//!
//! [`Pipeline`] is pure sequencing. Each [`Stage`] receives the previous stage's output
//! bytes together with mutable access to per-run state `S`, and returns new bytes or an
//! [`ApiError`](crate::error::ApiError). The first error stops the run; no later stage
//! executes, and the renderer alone produces the bytes returned by [`Pipeline::run`].
//! `run` therefore never fails.
//!
//! Stages may ignore the byte channel and talk through the state instead. The unmarshal
//! and invoke stages pass an empty buffer between them and communicate through the
//! handler instance held by [`Exchange`].
//!
//! ## Request stages
//!
//! [`stages::request_pipeline`] builds the canonical stage list for one route from its
//! compiled schemas, once, at registration:
//!
//! ```text
//! merge_defaults -> validate_input -> coerce_input -> unmarshal -> invoke
//!   -> marshal -> format_output -> validate_output -> pack
//! ```
//!
//! `validate_output` is omitted when output validation is disabled in
//! [`RuntimeConfig`](crate::runtime_config::RuntimeConfig).
//!
//! ## Example
//!
//! ```rust
//! use apistream::error::ApiError;
//! use apistream::pipeline::{Pipeline, Stage};
//! use std::sync::Arc;
//!
//! let pipeline: Pipeline<Vec<&'static str>> = Pipeline::new(
//!     Arc::new(|_trace: &Vec<&'static str>, err: &apistream::pipeline::PipelineError| {
//!         format!("failed at {}", err.stage).into_bytes()
//!     }),
//!     vec![
//!         Stage::new("upper", |trace: &mut Vec<&'static str>, input: Vec<u8>| {
//!             trace.push("upper");
//!             Ok(input.to_ascii_uppercase())
//!         }),
//!         Stage::new("reject", |trace: &mut Vec<&'static str>, _input: Vec<u8>| {
//!             trace.push("reject");
//!             Err(ApiError::business("no"))
//!         }),
//!     ],
//! );
//!
//! let mut trace = Vec::new();
//! assert_eq!(pipeline.run(&mut trace, b"hi".to_vec()), b"failed at reject".to_vec());
//! assert_eq!(trace, ["upper", "reject"]);
//! ```

mod core;
pub mod stages;

pub use core::*;
pub use stages::{request_pipeline, Exchange, StageOptions};
