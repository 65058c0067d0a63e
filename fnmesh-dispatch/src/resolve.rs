use fnmesh_cache::HotRouteCache;
use fnmesh_core::AppError;
use fnmesh_store::{DataError, ResolvedRoute, RouteResolver};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Hot-Route Cache in front of a per-`(app, path)` mutex that collapses
/// concurrent identical cache misses into one backing datastore call (spec
/// §4.5 step 4). Grounded on the teacher's single-lock cache shape
/// ([`fnmesh_cache::HotRouteCache`]) plus a coalescing layer the teacher has
/// no direct counterpart for — the Go source's `singleflight.Group` keyed by
/// `RouteFilter`, expressed here as one `tokio::sync::Mutex` per key instead
/// of a third-party singleflight crate.
pub struct RouteResolverCoalescer {
    cache: Arc<HotRouteCache>,
    inflight: AsyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RouteResolverCoalescer {
    pub fn new(cache: Arc<HotRouteCache>) -> Self {
        RouteResolverCoalescer { cache, inflight: AsyncMutex::new(HashMap::new()) }
    }

    /// Resolve `(app_name, path)`, consulting the cache first and coalescing
    /// concurrent misses onto a single `datastore.resolve` call.
    pub async fn resolve(&self, datastore: &dyn RouteResolver, app_name: &str, path: &str) -> Result<ResolvedRoute, AppError> {
        if let Some(hit) = self.cache.get(app_name, path) {
            return Ok(hit);
        }

        let key = format!("{app_name}\u{0}{path}");
        let lock = {
            let mut inflight = self.inflight.lock().await;
            inflight.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        let _guard = lock.lock().await;

        // A waiter that arrived while the first caller was in flight finds
        // the answer already cached and never touches the datastore.
        if let Some(hit) = self.cache.get(app_name, path) {
            self.evict_if_unused(&key, &lock).await;
            return Ok(hit);
        }

        let result = datastore.resolve(app_name, path).await.map_err(map_resolve_err);
        self.evict_if_unused(&key, &lock).await;

        match result? {
            Some(resolved) => {
                self.cache.insert(app_name, path.to_string(), resolved.clone());
                Ok(resolved)
            }
            None => Err(AppError::RoutesNotFound(path.to_string())),
        }
    }

    /// Drop the inflight entry once no other waiter holds a clone, so the
    /// map doesn't grow with one entry per distinct path ever resolved.
    async fn evict_if_unused(&self, key: &str, lock: &Arc<AsyncMutex<()>>) {
        let mut inflight = self.inflight.lock().await;
        if Arc::strong_count(lock) <= 2 {
            inflight.remove(key);
        }
    }
}

fn map_resolve_err(err: DataError) -> AppError {
    AppError::Internal(err.to_string())
}
