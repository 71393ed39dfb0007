use crate::context::RequestContext;
use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// `(method, path)`; the method is stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub method: String,
    pub path: String,
}

impl RouteKey {
    pub fn new(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        RouteKey {
            method: method.as_ref().trim().to_ascii_uppercase(),
            path: path.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Descriptive metadata about an API, used for listings and logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProfile {
    /// Business domain; copied into [`RequestContext::category`]
    pub domain: String,
    pub name: String,
    pub title: String,
    pub description: String,
}

/// Per-route execution switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Resolve a token to a user before the pipeline runs
    pub auth: bool,
}

/// A business API: request fields, declared schemas and the business function.
pub trait Api: Default + DeserializeOwned + Send + 'static {
    /// Serialized as the response body before output formatting
    type Output: Serialize + Send + 'static;

    fn route(&self) -> RouteKey;

    /// Input line schema; empty declines input validation.
    fn input_schema(&self) -> &str {
        ""
    }

    /// Output line schema; empty declines output formatting and validation.
    fn output_schema(&self) -> &str {
        ""
    }

    fn profile(&self) -> ApiProfile {
        ApiProfile::default()
    }

    fn config(&self) -> ApiConfig {
        ApiConfig::default()
    }

    /// Run the business function against the populated request fields.
    fn handle(&mut self, ctx: &RequestContext) -> Result<Option<Self::Output>, ApiError>;
}

/// Type-erased per-request handler state driven by the pipeline.
pub trait ApiInstance: Send {
    /// Replace the request fields with the formatted input document.
    fn bind(&mut self, input: &[u8]) -> Result<(), ApiError>;

    /// Call the business function and keep its output.
    fn invoke(&mut self, ctx: &RequestContext) -> Result<(), ApiError>;

    /// Serialize the kept output; [`ApiError::NilOutput`] if there is none.
    fn marshal(&self) -> Result<Vec<u8>, ApiError>;

    /// The concrete [`Api`] value.
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A fresh `T` plus the output its business function produced.
pub struct Instance<T: Api> {
    api: T,
    output: Option<T::Output>,
}

impl<T: Api> Instance<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            api: T::default(),
            output: None,
        }
    }

    pub fn api(&self) -> &T {
        &self.api
    }

    pub fn output(&self) -> Option<&T::Output> {
        self.output.as_ref()
    }
}

impl<T: Api> Default for Instance<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Api> ApiInstance for Instance<T> {
    fn bind(&mut self, input: &[u8]) -> Result<(), ApiError> {
        self.api = serde_json::from_slice(input).map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(())
    }

    fn invoke(&mut self, ctx: &RequestContext) -> Result<(), ApiError> {
        self.output = self.api.handle(ctx)?;
        Ok(())
    }

    fn marshal(&self) -> Result<Vec<u8>, ApiError> {
        let output = self.output.as_ref().ok_or(ApiError::NilOutput)?;
        serde_json::to_vec(output).map_err(|e| ApiError::Encode(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        &self.api
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.api
    }
}

/// Builds a fresh instance for one request.
pub type InstanceFactory = fn() -> Box<dyn ApiInstance>;

pub(crate) fn factory_for<T: Api>() -> InstanceFactory {
    || -> Box<dyn ApiInstance> { Box::new(Instance::<T>::new()) }
}
