//! # Auth Module
//!
//! Resolves a request token to a user id before the pipeline runs.
//!
//! ## Token lookup
//!
//! The token key (default `token`) is looked up, in order, as:
//!
//! 1. a request header of that name
//! 2. an `Authorization: Bearer <token>` header
//! 3. a cookie of that name
//! 4. a key of the flat request document (form or query)
//!
//! An absent or empty token fails. On success the user id is written into the document
//! under `userId` (configurable) and into
//! [`RequestContext::user_id`](crate::context::RequestContext::user_id).
//!
//! ## Resolvers
//!
//! - [`StaticTokenResolver`]: fixed token to user id map, for tests and internal tools
//! - [`JwtTokenResolver`]: HS256 JWT verification via `jsonwebtoken`; the user id is
//!   read from a configurable claim (default `sub`)

use crate::error::ApiError;
use crate::runtime_config::AuthConfig;
use http::header::{AUTHORIZATION, COOKIE};
use http::Request;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Identity produced by a [`TokenResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    /// Verified claims, when the token was a JWT
    pub claims: Option<Value>,
}

impl AuthUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            claims: None,
        }
    }
}

/// Token to user resolution.
pub trait TokenResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<AuthUser, ApiError>;
}

/// Fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, String>,
}

impl StaticTokenResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

impl TokenResolver for StaticTokenResolver {
    fn resolve(&self, token: &str) -> Result<AuthUser, ApiError> {
        self.tokens
            .get(token)
            .map(AuthUser::new)
            .ok_or_else(|| ApiError::Unauthorized("unknown token".into()))
    }
}

/// HS256 JWT verification.
pub struct JwtTokenResolver {
    key: DecodingKey,
    validation: Validation,
    user_claim: String,
}

impl JwtTokenResolver {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::new(Algorithm::HS256),
            user_claim: "sub".into(),
        }
    }

    #[must_use]
    pub fn user_claim(mut self, claim: impl Into<String>) -> Self {
        self.user_claim = claim.into();
        self
    }

    #[must_use]
    pub fn leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }
}

impl TokenResolver for JwtTokenResolver {
    fn resolve(&self, token: &str) -> Result<AuthUser, ApiError> {
        let data = decode::<Value>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "JWT verification failed");
            ApiError::Unauthorized(format!("invalid token: {e}"))
        })?;
        let user_id = match data.claims.get(&self.user_claim) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ApiError::Unauthorized(format!(
                    "token has no `{}` claim",
                    self.user_claim
                )))
            }
        };
        Ok(AuthUser {
            user_id,
            claims: Some(data.claims),
        })
    }
}

fn cookie_value(request: &Request<Vec<u8>>, name: &str) -> Option<String> {
    request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// Find the request token; see the module docs for the lookup order.
pub fn extract_token(
    request: &Request<Vec<u8>>,
    document: &Map<String, Value>,
    token_key: &str,
) -> Option<String> {
    let headers = request.headers();
    if let Some(token) = headers.get(token_key).and_then(|v| v.to_str().ok()) {
        return Some(token.trim().to_string());
    }
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    if let Some(token) = cookie_value(request, token_key) {
        return Some(token);
    }
    document
        .get(token_key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Token lookup plus resolution plus user injection.
#[derive(Clone)]
pub struct Authenticator {
    resolver: Arc<dyn TokenResolver>,
    token_key: String,
    user_id_key: String,
}

impl Authenticator {
    pub fn new(resolver: Arc<dyn TokenResolver>) -> Self {
        let defaults = AuthConfig::default();
        Self {
            resolver,
            token_key: defaults.token_key,
            user_id_key: defaults.user_id_key,
        }
    }

    /// JWT resolver when `jwt_secret` is set, otherwise `fallback`.
    pub fn from_config(config: &AuthConfig, fallback: Arc<dyn TokenResolver>) -> Self {
        let resolver: Arc<dyn TokenResolver> = match &config.jwt_secret {
            Some(secret) => Arc::new(JwtTokenResolver::new(secret).user_claim(&config.user_claim)),
            None => fallback,
        };
        Self {
            resolver,
            token_key: config.token_key.clone(),
            user_id_key: config.user_id_key.clone(),
        }
    }

    /// Resolve the request's user and write its id into `document`.
    pub fn authenticate(
        &self,
        request: &Request<Vec<u8>>,
        document: &mut Map<String, Value>,
    ) -> Result<AuthUser, ApiError> {
        let token = extract_token(request, document, &self.token_key).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::Unauthorized("token is empty".into()));
        }
        let user = self.resolver.resolve(&token)?;
        document.insert(self.user_id_key.clone(), Value::String(user.user_id.clone()));
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn request(headers: &[(&str, &str)]) -> Request<Vec<u8>> {
        let mut builder = Request::builder().uri("/x");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Vec::new()).unwrap()
    }

    fn now() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    #[test]
    fn test_lookup_order() {
        let doc: Map<String, Value> = json!({"token": "from-doc"}).as_object().unwrap().clone();
        let req = request(&[("token", "from-header"), ("cookie", "token=from-cookie")]);
        assert_eq!(extract_token(&req, &doc, "token").as_deref(), Some("from-header"));
        let req = request(&[("authorization", "Bearer from-bearer"), ("cookie", "token=from-cookie")]);
        assert_eq!(extract_token(&req, &doc, "token").as_deref(), Some("from-bearer"));
        let req = request(&[("cookie", "a=1; token=from%20cookie")]);
        assert_eq!(extract_token(&req, &doc, "token").as_deref(), Some("from cookie"));
        let req = request(&[]);
        assert_eq!(extract_token(&req, &doc, "token").as_deref(), Some("from-doc"));
        assert_eq!(extract_token(&req, &Map::new(), "token"), None);
    }

    #[test]
    fn test_authenticate_injects_user_id() {
        let auth = Authenticator::new(Arc::new(StaticTokenResolver::new().with_token("t1", "u-42")));
        let mut doc = Map::new();
        let user = auth.authenticate(&request(&[("token", "t1")]), &mut doc).unwrap();
        assert_eq!(user.user_id, "u-42");
        assert_eq!(doc["userId"], "u-42");
    }

    #[test]
    fn test_empty_and_unknown_tokens_fail() {
        let auth = Authenticator::new(Arc::new(StaticTokenResolver::new()));
        let err = auth.authenticate(&request(&[("token", " ")]), &mut Map::new()).unwrap_err();
        assert_eq!(err.to_string(), "unauthorized: token is empty");
        let err = auth.authenticate(&request(&[("token", "nope")]), &mut Map::new()).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_jwt_resolver() {
        let secret = "test-secret";
        let claims = json!({"sub": "user-7", "exp": now() + 600});
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap();
        let user = JwtTokenResolver::new(secret).resolve(&token).unwrap();
        assert_eq!(user.user_id, "user-7");
        assert_eq!(user.claims.unwrap()["sub"], "user-7");

        assert!(JwtTokenResolver::new("other-secret").resolve(&token).is_err());
    }

    #[test]
    fn test_jwt_custom_claim_and_expiry() {
        let secret = "s";
        let key = EncodingKey::from_secret(secret.as_bytes());
        let token = encode(&Header::default(), &json!({"uid": 9, "exp": now() + 600}), &key).unwrap();
        let user = JwtTokenResolver::new(secret).user_claim("uid").resolve(&token).unwrap();
        assert_eq!(user.user_id, "9");

        let expired = encode(&Header::default(), &json!({"sub": "a", "exp": now() - 3600}), &key).unwrap();
        assert!(JwtTokenResolver::new(secret).resolve(&expired).is_err());
    }

    #[test]
    fn test_from_config_prefers_jwt_secret() {
        let config = AuthConfig {
            jwt_secret: Some("k".into()),
            ..AuthConfig::default()
        };
        let auth = Authenticator::from_config(&config, Arc::new(StaticTokenResolver::new().with_token("t", "u")));
        assert!(auth.authenticate(&request(&[("token", "t")]), &mut Map::new()).is_err());
    }
}
