//! Per-app LRU of recently matched routes, front of every dispatch (spec
//! component C). Generalizes the teacher's `TtlCache` (a single
//! `DashMap`-backed structure) into an LRU guarded by *one* process-wide
//! mutex across every app's cache, because spec §4.3 requires a cross-app
//! invariant — refresh and eviction serialized under the same lock — that a
//! per-entry concurrent map like `DashMap` cannot express on its own.

use fnmesh_store::{Datastore, ResolvedRoute};
use std::collections::HashMap;
use std::sync::Mutex;

/// One app's recently matched routes, most-recently-used first.
struct AppCache {
    entries: Vec<(String, ResolvedRoute)>,
}

impl AppCache {
    fn new() -> Self {
        AppCache { entries: Vec::new() }
    }

    fn get(&mut self, path: &str) -> Option<ResolvedRoute> {
        let idx = self.entries.iter().position(|(p, _)| p == path)?;
        let (p, route) = self.entries.remove(idx);
        let out = route.clone();
        self.entries.insert(0, (p, route));
        Some(out)
    }

    fn put(&mut self, path: String, route: ResolvedRoute, max_entries: usize) {
        if let Some(idx) = self.entries.iter().position(|(p, _)| *p == path) {
            self.entries.remove(idx);
        }
        self.entries.insert(0, (path, route));
        if self.entries.len() > max_entries {
            self.entries.truncate(max_entries);
        }
    }

    /// Drop every entry whose *resolved* route matches `route_path` — the
    /// route's own definition path (e.g. `/blogs/:id`), which is not
    /// necessarily any entry's cache key (e.g. `/blogs/123`). A route write
    /// only ever knows the definition path, so matching has to go through
    /// `ResolvedRoute::route.path`, never the key.
    fn invalidate_route(&mut self, route_path: &str) {
        self.entries.retain(|(_, resolved)| resolved.route.path != route_path);
    }
}

/// Hot-Route Cache: one process-wide mutex guarding `app -> AppCache`.
/// `maxEntries` caps each app's LRU independently (default 100, spec §4.3).
pub struct HotRouteCache {
    apps: Mutex<HashMap<String, AppCache>>,
    max_entries: usize,
}

impl HotRouteCache {
    pub fn new(max_entries: usize) -> Self {
        HotRouteCache { apps: Mutex::new(HashMap::new()), max_entries }
    }

    /// On hit, move the entry to the front and return it.
    pub fn get(&self, app_name: &str, path: &str) -> Option<ResolvedRoute> {
        let mut apps = self.apps.lock().expect("hot-route cache mutex poisoned");
        apps.get_mut(app_name)?.get(path)
    }

    /// Insert at the front, evicting the tail if `maxEntries` is exceeded.
    pub fn insert(&self, app_name: &str, path: String, route: ResolvedRoute) {
        let mut apps = self.apps.lock().expect("hot-route cache mutex poisoned");
        apps.entry(app_name.to_string()).or_insert_with(AppCache::new).put(path, route, self.max_entries);
    }

    /// Invalidate every cached entry for the route whose *definition* path
    /// is `route_path` (spec §4.3: "on any route write ... the cache entry
    /// for that (app, path) must be invalidated or refreshed"). A write only
    /// knows the route's own path, which for a wildcard/param route (e.g.
    /// `/blogs/:id`) is never the same string as the concrete request paths
    /// (e.g. `/blogs/123`) the resolver actually cached under — so this
    /// matches on each entry's resolved route rather than its key.
    pub fn invalidate(&self, app_name: &str, route_path: &str) {
        let mut apps = self.apps.lock().expect("hot-route cache mutex poisoned");
        if let Some(cache) = apps.get_mut(app_name) {
            cache.invalidate_route(route_path);
        }
    }

    /// Drop stale concrete matches for `route_path`, then seed the
    /// definition path itself with the updated route so an exact hit on it
    /// is immediately fresh. Other concrete paths that resolved through this
    /// route pick up the update on their next (now cache-miss) resolve.
    pub fn refresh(&self, app_name: &str, route_path: String, route: ResolvedRoute) {
        {
            let mut apps = self.apps.lock().expect("hot-route cache mutex poisoned");
            if let Some(cache) = apps.get_mut(app_name) {
                cache.invalidate_route(&route_path);
            }
        }
        self.insert(app_name, route_path, route);
    }

    pub fn len(&self, app_name: &str) -> usize {
        let apps = self.apps.lock().expect("hot-route cache mutex poisoned");
        apps.get(app_name).map(|c| c.entries.len()).unwrap_or(0)
    }

    pub fn is_empty_for(&self, app_name: &str) -> bool {
        self.len(app_name) == 0
    }

    /// Pareto-bounded priming (spec §4.3): `entries = min(routes, 1024 +
    /// 0.2*(routes - 1024))`. Loads every app from the datastore, then fills
    /// each app's cache with that many of its routes.
    pub async fn prime(&self, datastore: &dyn Datastore) {
        let apps = match datastore.get_apps(&fnmesh_store::AppFilter::default()).await {
            Ok(apps) => apps,
            Err(err) => {
                tracing::warn!(error = %err, "hot-route cache priming: failed to list apps");
                return;
            }
        };

        for app in apps {
            let routes = match datastore.get_routes_by_app(&app.name).await {
                Ok(routes) => routes,
                Err(err) => {
                    tracing::warn!(app = %app.name, error = %err, "hot-route cache priming: failed to list routes");
                    continue;
                }
            };
            let count = pareto_bound(routes.len());
            for route in routes.into_iter().take(count) {
                let path = route.path.clone();
                self.insert(&app.name, path, ResolvedRoute { route, params: Vec::new() });
            }
        }
    }
}

/// `min(routes, 1024 + 0.2*(routes - 1024))`, per spec §4.3.
fn pareto_bound(routes: usize) -> usize {
    if routes <= 1024 {
        routes
    } else {
        let extra = 0.2 * (routes - 1024) as f64;
        (1024.0 + extra) as usize
    }
}
