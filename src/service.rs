//! HTTP-facing glue: request → adapter → resolve → auth → pipeline → response.
//!
//! | Outcome | Status |
//! |---|---|
//! | adapter could not build a document | 400 |
//! | no route for `(method, path)` | 404 |
//! | route requires auth and the token does not resolve | 401 |
//! | pipeline ran (success or rendered error) | 200 |
//!
//! Every body is JSON; failures before the pipeline use the same error envelope the
//! pipeline renders.

use crate::adapter::{request_to_map, AdapterOptions};
use crate::auth::Authenticator;
use crate::context::{Cancellation, RequestContext, RequestId};
use crate::error::ApiError;
use crate::registry::Registry;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct ApiService {
    registry: Arc<Registry>,
    authenticator: Option<Authenticator>,
    adapter: AdapterOptions,
}

impl ApiService {
    pub fn new(registry: Arc<Registry>) -> Self {
        let adapter = AdapterOptions::from(registry.runtime_config());
        Self {
            registry,
            authenticator: None,
            adapter,
        }
    }

    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn handle(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        self.handle_with_cancellation(request, Cancellation::new())
    }

    /// Like [`handle`](Self::handle), with a cancellation flag owned by the caller.
    pub fn handle_with_cancellation(
        &self,
        request: Request<Vec<u8>>,
        cancellation: Cancellation,
    ) -> Response<Vec<u8>> {
        let start = Instant::now();
        let request_id = RequestId::from_header(
            request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();

        let (status, body) = match self.dispatch(&request, request_id, cancellation) {
            Ok(body) => (StatusCode::OK, body),
            Err(err) => {
                let status = status_for(&err);
                warn!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status = status.as_u16(),
                    category = err.category(),
                    error = %err,
                    "Request rejected before pipeline"
                );
                (status, self.registry.envelope().error_body(&err.to_string()))
            }
        };

        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        json_response(status, body, request_id)
    }

    fn dispatch(
        &self,
        request: &Request<Vec<u8>>,
        request_id: RequestId,
        cancellation: Cancellation,
    ) -> Result<Vec<u8>, ApiError> {
        let mut document = request_to_map(request, &self.adapter)?;
        let mut invocation = self
            .registry
            .resolve(request.method().as_str(), request.uri().path())?;
        let mut ctx = RequestContext::new()
            .with_request_id(request_id)
            .with_cancellation(cancellation);

        if invocation.config().auth {
            let authenticator = self
                .authenticator
                .as_ref()
                .ok_or_else(|| ApiError::Unauthorized("no token resolver configured".into()))?;
            let user = authenticator.authenticate(request, &mut document)?;
            ctx.user_id = Some(user.user_id);
        }

        let input = serde_json::to_vec(&Value::Object(document))?;
        Ok(invocation.run(ctx, &input))
    }
}

fn status_for(err: &ApiError) -> StatusCode {
    match err {
        ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ApiError::Adapter(_) | ApiError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn json_response(status: StatusCode, body: Vec<u8>, request_id: RequestId) -> Response<Vec<u8>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    response
}
