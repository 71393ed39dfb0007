//! Error taxonomy shared by every stage of the request pipeline.
//!
//! Startup-time failures ([`SchemaCompileError`], [`ApiError::DuplicateRoute`]) are
//! expected to abort service initialisation. Everything else is produced while a
//! request runs and is turned into the error envelope by the pipeline's renderer.

use crate::coerce::CoercionError;
use crate::handler::RouteKey;
use crate::validator::ValidationError;
use thiserror::Error;

/// Failure while turning line-schema text into a [`CompiledSchema`](crate::schema::CompiledSchema).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaCompileError {
    /// A schema was required but the text was blank
    #[error("line schema is empty")]
    Empty,
    /// The line-schema text could not be parsed
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number in the schema text
        line: usize,
        /// Human readable reason
        message: String,
    },
    /// A declared `default` does not parse as the field's declared type
    #[error("field `{field}`: default `{value}` is not a valid {expected}")]
    InvalidDefault {
        /// Field fullname
        field: String,
        /// Raw default text
        value: String,
        /// Declared type name
        expected: &'static str,
    },
    /// The derived JSON Schema was rejected by the validator backend
    #[error("derived JSON Schema is invalid: {0}")]
    InvalidJsonSchema(String),
}

/// Every error the registry, the pipeline stages and the boundary collaborators can raise.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("schema compile error: {0}")]
    SchemaCompile(#[from] SchemaCompileError),

    #[error("route already registered: {0}")]
    DuplicateRoute(RouteKey),

    #[error("route not found: {0}")]
    RouteNotFound(RouteKey),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// Returned by a business function
    #[error("{0}")]
    Business(String),

    /// The business function reported success without producing an output object
    #[error("response must not be nil")]
    NilOutput,

    /// The formatted input could not be unmarshaled into the handler instance
    #[error("decode input: {0}")]
    Decode(String),

    /// The handler output could not be marshaled
    #[error("encode output: {0}")]
    Encode(String),

    /// A stage received bytes that are not a JSON document
    #[error("invalid JSON document: {0}")]
    InvalidDocument(String),

    /// The HTTP adapter could not build a flat JSON document
    #[error("bad request: {0}")]
    Adapter(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Convenience constructor for business failures.
    pub fn business(message: impl std::fmt::Display) -> Self {
        ApiError::Business(message.to_string())
    }

    /// Stable category name used in logs and by custom renderers.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::SchemaCompile(_) => "schema_compile",
            ApiError::DuplicateRoute(_) => "duplicate_route",
            ApiError::RouteNotFound(_) => "route_not_found",
            ApiError::Validation(_) => "validation",
            ApiError::Coercion(_) => "coercion",
            ApiError::Business(_) => "business",
            ApiError::NilOutput => "nil_output",
            ApiError::Decode(_) => "decode",
            ApiError::Encode(_) => "encode",
            ApiError::InvalidDocument(_) => "invalid_document",
            ApiError::Adapter(_) => "adapter",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Cancelled => "cancelled",
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidDocument(err.to_string())
    }
}
