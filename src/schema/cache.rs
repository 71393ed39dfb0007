use super::compiler::{compile_optional, CompiledSchema};
use crate::error::SchemaCompileError;
use crate::lineschema::Direction;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info};

/// First 16 hex characters of the SHA-256 of `text`.
#[must_use]
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Thread-safe cache of compiled schemas.
///
/// Keys are `(direction, fingerprint)`, so two routes declaring the same schema text
/// share one `Arc<CompiledSchema>`. When disabled every call compiles a fresh artifact.
///
/// # Example
///
/// ```rust
/// use apistream::lineschema::Direction;
/// use apistream::schema::SchemaCache;
///
/// let cache = SchemaCache::new(true);
/// let a = cache.get_or_compile("fullname=id,format=int", Direction::In).unwrap();
/// let b = cache.get_or_compile("fullname=id,format=int", Direction::In).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// assert_eq!(cache.size(), 1);
/// ```
#[derive(Clone)]
pub struct SchemaCache {
    entries: Arc<DashMap<(Direction, String), Arc<CompiledSchema>>>,
    enabled: bool,
}

impl SchemaCache {
    pub fn new(enabled: bool) -> Self {
        info!(enabled = enabled, "Initializing line schema cache");
        Self {
            entries: Arc::new(DashMap::new()),
            enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Return the cached artifact for `text`, compiling it on a miss.
    ///
    /// Blank text compiles to an artifact that declines validation.
    pub fn get_or_compile(
        &self,
        text: &str,
        direction: Direction,
    ) -> Result<Arc<CompiledSchema>, SchemaCompileError> {
        if !self.enabled {
            return compile_optional(text, direction).map(Arc::new);
        }

        let key = (direction, fingerprint(text));
        if let Some(hit) = self.entries.get(&key) {
            debug!(direction = %direction, fingerprint = %key.1, "Schema cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let compiled = Arc::new(compile_optional(text, direction)?);
        // another registration may have compiled the same text meanwhile; keep the first
        let cached = Arc::clone(self.entries.entry(key).or_insert(compiled).value());
        info!(
            direction = %direction,
            fingerprint = %cached.fingerprint(),
            cache_size = self.entries.len(),
            "Schema compiled and cached"
        );
        Ok(cached)
    }

    /// Number of cached artifacts.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        info!(dropped = dropped, "Schema cache cleared");
    }
}
