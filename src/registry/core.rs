use crate::context::RequestContext;
use crate::defaults::DefaultSet;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::handler::{factory_for, Api, ApiConfig, ApiProfile, InstanceFactory, RouteKey};
use crate::lineschema::Direction;
use crate::pipeline::{request_pipeline, Exchange, Pipeline, StageOptions};
use crate::runtime_config::{RuntimeConfig, ServiceConfig};
use crate::schema::{CompiledSchema, SchemaCache};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything retained from a registered prototype.
pub struct RouteEntry {
    pub route: RouteKey,
    pub profile: ApiProfile,
    pub config: ApiConfig,
    /// Concrete `Api` type name, for logs
    pub type_name: &'static str,
    pub input: Arc<CompiledSchema>,
    pub output: Arc<CompiledSchema>,
    pipeline: Pipeline<Exchange>,
    factory: InstanceFactory,
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("route", &self.route)
            .field("type_name", &self.type_name)
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// One resolved request: the route entry plus a fresh handler instance.
pub struct Invocation {
    entry: Arc<RouteEntry>,
    exchange: Exchange,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl Invocation {
    #[must_use]
    pub fn route(&self) -> &RouteKey {
        &self.entry.route
    }

    #[must_use]
    pub fn config(&self) -> ApiConfig {
        self.entry.config
    }

    #[must_use]
    pub fn profile(&self) -> &ApiProfile {
        &self.entry.profile
    }

    /// The route's `(input, output)` compiled schemas.
    #[must_use]
    pub fn schemas(&self) -> (&Arc<CompiledSchema>, &Arc<CompiledSchema>) {
        (&self.entry.input, &self.entry.output)
    }

    /// Context of the last run, including its [`RunLog`](crate::context::RunLog).
    #[must_use]
    pub fn context(&self) -> &RequestContext {
        &self.exchange.ctx
    }

    /// The handler instance as its concrete type.
    #[must_use]
    pub fn instance<T: Api>(&self) -> Option<&T> {
        self.exchange.handler.as_any().downcast_ref::<T>()
    }

    pub fn instance_mut<T: Api>(&mut self) -> Option<&mut T> {
        self.exchange.handler.as_any_mut().downcast_mut::<T>()
    }

    /// Run the route's pipeline. Always returns a body: the packed output or the error
    /// envelope.
    pub fn run(&mut self, mut ctx: RequestContext, input: &[u8]) -> Vec<u8> {
        if ctx.category.is_none() && !self.entry.profile.domain.is_empty() {
            ctx.category = Some(self.entry.profile.domain.clone());
        }
        self.exchange.ctx = ctx;
        let route = self.entry.route.to_string();
        let body = match self.entry.pipeline.try_run(&mut self.exchange, input.to_vec()) {
            Ok(body) => body,
            Err(err) => {
                self.exchange.ctx.log.record_error(&err.error);
                debug!(
                    request_id = %self.exchange.ctx.request_id,
                    route = %route,
                    stage = err.stage,
                    category = err.category(),
                    "Rendering error envelope"
                );
                self.entry.pipeline.render(&self.exchange, &err)
            }
        };
        self.exchange.ctx.emit_run_log(&route);
        body
    }
}

/// Concurrent route table.
pub struct Registry {
    routes: DashMap<RouteKey, Arc<RouteEntry>>,
    cache: SchemaCache,
    runtime: RuntimeConfig,
    envelope: Envelope,
    envelope_defaults: Arc<DefaultSet>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default(), &ServiceConfig::default())
    }

    #[must_use]
    pub fn with_config(runtime: RuntimeConfig, service: &ServiceConfig) -> Self {
        let envelope = Envelope::new(service.envelope.clone());
        let envelope_defaults = Arc::new(envelope.success_defaults());
        Self {
            routes: DashMap::new(),
            cache: SchemaCache::new(runtime.schema_cache),
            runtime,
            envelope,
            envelope_defaults,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn runtime_config(&self) -> RuntimeConfig {
        self.runtime
    }

    #[must_use]
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Register an API prototype. Only its route, schemas, profile and config are kept.
    pub fn register<T: Api>(&self, prototype: T) -> Result<RouteKey, ApiError> {
        let route = prototype.route();
        let type_name = std::any::type_name::<T>();
        if self.routes.contains_key(&route) {
            return Err(ApiError::DuplicateRoute(route));
        }

        let compile = |text: &str, direction: Direction| {
            self.cache.get_or_compile(text, direction).map_err(|e| {
                error!(
                    route = %route,
                    handler = type_name,
                    direction = %direction,
                    error = %e,
                    "Failed to compile line schema"
                );
                ApiError::SchemaCompile(e)
            })
        };
        let input = compile(prototype.input_schema(), Direction::In)?;
        let output = compile(prototype.output_schema(), Direction::Out)?;

        let pipeline = request_pipeline(
            &input,
            &output,
            &self.envelope_defaults,
            self.envelope.renderer(),
            StageOptions {
                validate_output: self.runtime.validate_output,
            },
        );
        let stage_count = pipeline.len();
        let entry = Arc::new(RouteEntry {
            route: route.clone(),
            profile: prototype.profile(),
            config: prototype.config(),
            type_name,
            input,
            output,
            pipeline,
            factory: factory_for::<T>(),
        });

        match self.routes.entry(route.clone()) {
            Entry::Occupied(_) => return Err(ApiError::DuplicateRoute(route)),
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
        }
        info!(
            route = %route,
            handler = type_name,
            stages = stage_count,
            routes = self.routes.len(),
            "Route registered"
        );
        Ok(route)
    }

    /// Register or abort startup.
    ///
    /// # Panics
    ///
    /// On a schema compile error or a duplicate route.
    #[allow(clippy::panic)]
    pub fn must_register<T: Api>(&self, prototype: T) -> RouteKey {
        match self.register(prototype) {
            Ok(route) => route,
            Err(e) => panic!("failed to register {}: {e}", std::any::type_name::<T>()),
        }
    }

    /// Look up a route and build a fresh handler instance for it.
    pub fn resolve(&self, method: &str, path: &str) -> Result<Invocation, ApiError> {
        let key = RouteKey::new(method, path);
        let entry = match self.routes.get(&key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Err(ApiError::RouteNotFound(key)),
        };
        let handler = (entry.factory)();
        Ok(Invocation {
            entry,
            exchange: Exchange::new(RequestContext::default(), handler),
        })
    }

    /// Sorted snapshot of registered routes.
    #[must_use]
    pub fn list_routes(&self) -> Vec<RouteKey> {
        let mut routes: Vec<_> = self.routes.iter().map(|e| e.key().clone()).collect();
        routes.sort();
        routes
    }

    /// Profiles of every route, sorted by route.
    #[must_use]
    pub fn profiles(&self) -> Vec<(RouteKey, ApiProfile)> {
        let mut profiles: Vec<_> = self
            .routes
            .iter()
            .map(|e| (e.key().clone(), e.value().profile.clone()))
            .collect();
        profiles.sort_by(|a, b| a.0.cmp(&b.0));
        profiles
    }

    /// Remove a route. In-flight invocations keep their entry alive.
    pub fn deregister(&self, route: &RouteKey) -> bool {
        let removed = self.routes.remove(route).is_some();
        if removed {
            info!(route = %route, "Route deregistered");
        }
        removed
    }

    /// Drop every route and cached schema.
    pub fn shutdown(&self) {
        let dropped = self.routes.len();
        self.routes.clear();
        self.cache.clear();
        info!(dropped = dropped, "Registry shut down");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct Ping {
        name: String,
    }

    impl Api for Ping {
        type Output = Value;

        fn route(&self) -> RouteKey {
            RouteKey::get("/ping")
        }

        fn input_schema(&self) -> &str {
            "fullname=name,default=world"
        }

        fn profile(&self) -> ApiProfile {
            ApiProfile {
                domain: "health".into(),
                name: "ping".into(),
                ..ApiProfile::default()
            }
        }

        fn handle(&mut self, ctx: &RequestContext) -> Result<Option<Value>, ApiError> {
            Ok(Some(json!({ "hello": self.name, "category": ctx.category })))
        }
    }

    #[derive(Default, Deserialize)]
    struct Broken;

    impl Api for Broken {
        type Output = Value;

        fn route(&self) -> RouteKey {
            RouteKey::get("/broken")
        }

        fn input_schema(&self) -> &str {
            "fullname=size,format=int,default=ten"
        }

        fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<Value>, ApiError> {
            Ok(None)
        }
    }

    #[test]
    fn test_register_and_run() {
        let registry = Registry::new();
        registry.register(Ping::default()).unwrap();
        let mut invocation = registry.resolve("get", "/ping").unwrap();
        let body = invocation.run(RequestContext::new(), b"{}");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({"hello": "world", "category": "health", "code": "0", "message": "ok"})
        );
        assert_eq!(invocation.instance::<Ping>().unwrap().name, "world");
        assert!(invocation.context().log.error.is_none());
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let registry = Registry::new();
        registry.register(Ping::default()).unwrap();
        let err = registry.register(Ping::default()).unwrap_err();
        assert!(matches!(err, ApiError::DuplicateRoute(ref r) if r == &RouteKey::get("/ping")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_compile_failure_is_reported() {
        let registry = Registry::new();
        let err = registry.register(Broken).unwrap_err();
        assert!(matches!(err, ApiError::SchemaCompile(_)));
        assert!(registry.is_empty());
    }

    #[test]
    #[should_panic(expected = "failed to register")]
    fn test_must_register_panics() {
        Registry::new().must_register(Broken);
    }

    #[test]
    fn test_unknown_route() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("GET", "/nope"),
            Err(ApiError::RouteNotFound(_))
        ));
    }

    #[test]
    fn test_deregister_and_shutdown() {
        let registry = Registry::new();
        registry.register(Ping::default()).unwrap();
        assert_eq!(registry.profiles()[0].1.name, "ping");
        assert!(registry.deregister(&RouteKey::get("/ping")));
        assert!(!registry.deregister(&RouteKey::get("/ping")));
        registry.register(Ping::default()).unwrap();
        registry.shutdown();
        assert!(registry.is_empty());
        assert_eq!(registry.schema_cache().size(), 0);
    }
}
