//! HTTP request to flat JSON document.
//!
//! Sources are applied in order, later ones overwriting earlier keys:
//!
//! 1. JSON body (must be an object)
//! 2. `application/x-www-form-urlencoded` body
//! 3. query string
//! 4. headers, as `http_<name>` with `-` replaced by `_`
//! 5. `http_url`, the request URL without its query
//!
//! Repeated form and query keys keep their first value unless `array_params` is set, in
//! which case query keys seen more than once become arrays.

use crate::error::ApiError;
use crate::runtime_config::RuntimeConfig;
use http::header::{CONTENT_TYPE, HOST};
use http::Request;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterOptions {
    pub array_params: bool,
}

impl From<RuntimeConfig> for AdapterOptions {
    fn from(config: RuntimeConfig) -> Self {
        Self {
            array_params: config.array_params,
        }
    }
}

/// Build the flat JSON document for a request.
pub fn request_to_map(
    request: &Request<Vec<u8>>,
    options: &AdapterOptions,
) -> Result<Map<String, Value>, ApiError> {
    let mut document = Map::new();
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());
    let body = request.body();
    let has_body = !body.iter().all(u8::is_ascii_whitespace);

    match content_type.as_deref() {
        Some("application/x-www-form-urlencoded") => {
            set_pairs(&mut document, url::form_urlencoded::parse(body), false);
        }
        Some(ct) if ct.starts_with("multipart/") => {
            return Err(ApiError::Adapter(format!("unsupported content type {ct}")));
        }
        Some(ct) if ct.contains("json") && has_body => {
            document = parse_json_object(body)?;
        }
        None if has_body => {
            document = parse_json_object(body)?;
        }
        _ => {}
    }

    if let Some(query) = request.uri().query() {
        set_pairs(
            &mut document,
            url::form_urlencoded::parse(query.as_bytes()),
            options.array_params,
        );
    }

    for (name, value) in request.headers() {
        let key = format!("http_{}", name.as_str().replace('-', "_"));
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        document.insert(key, Value::String(value));
    }

    document.insert("http_url".into(), Value::String(request_url(request)));
    Ok(document)
}

/// [`request_to_map`] serialized to bytes, ready for the pipeline.
pub fn request_to_json(
    request: &Request<Vec<u8>>,
    options: &AdapterOptions,
) -> Result<Vec<u8>, ApiError> {
    let document = request_to_map(request, options)?;
    serde_json::to_vec(&Value::Object(document)).map_err(|e| ApiError::Adapter(e.to_string()))
}

fn parse_json_object(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::Adapter("JSON body must be an object".into())),
        Err(e) => Err(ApiError::Adapter(format!("invalid JSON body: {e}"))),
    }
}

fn set_pairs<'a>(
    document: &mut Map<String, Value>,
    pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    arrays: bool,
) {
    let mut seen: Map<String, Value> = Map::new();
    for (key, value) in pairs {
        let value = Value::String(value.into_owned());
        match seen.get_mut(key.as_ref()) {
            Some(Value::Array(values)) if arrays => values.push(value),
            Some(existing) if arrays => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            Some(_) => {}
            None => {
                seen.insert(key.into_owned(), value);
            }
        }
    }
    document.extend(seen);
}

fn request_url(request: &Request<Vec<u8>>) -> String {
    let uri = request.uri();
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            request
                .headers()
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();
    format!("{scheme}://{host}{}", uri.path())
}
