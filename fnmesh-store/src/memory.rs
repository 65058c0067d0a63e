use crate::datastore::{Datastore, ResolvedRoute, RouteResolver};
use crate::error::DataError;
use crate::filter::{AppFilter, RouteFilter};
use crate::model::{App, Route};
use fnmesh_route::RouteTrie;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct AppEntry {
    app: App,
    routes: RouteTrie<Route>,
}

/// In-memory [`Datastore`] backend. The only concrete backend shipped here
/// (spec Non-goal: persistent storage format) — bolt/postgres/mysql
/// backends are external collaborators behind the same trait.
///
/// Each app owns a resident [`RouteTrie`], so route resolution never
/// rebuilds a tree per lookup.
pub struct MemoryDatastore {
    apps: RwLock<HashMap<String, AppEntry>>,
    extras: RwLock<HashMap<String, Vec<u8>>>,
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatastore {
    pub fn new() -> Self {
        MemoryDatastore { apps: RwLock::new(HashMap::new()), extras: RwLock::new(HashMap::new()) }
    }
}

#[async_trait::async_trait]
impl Datastore for MemoryDatastore {
    async fn get_app(&self, name: &str) -> Result<App, DataError> {
        let apps = self.apps.read().await;
        apps.get(name).map(|e| e.app.clone()).ok_or_else(|| DataError::AppNotFound(name.to_string()))
    }

    async fn get_apps(&self, filter: &AppFilter) -> Result<Vec<App>, DataError> {
        let apps = self.apps.read().await;
        Ok(apps.values().map(|e| &e.app).filter(|a| filter.matches(&a.name)).cloned().collect())
    }

    async fn insert_app(&self, app: App) -> Result<App, DataError> {
        let mut apps = self.apps.write().await;
        if apps.contains_key(&app.name) {
            return Err(DataError::AppAlreadyExists(app.name));
        }
        let stored = app.clone();
        apps.insert(app.name.clone(), AppEntry { app, routes: RouteTrie::new() });
        Ok(stored)
    }

    async fn update_app(&self, name: &str, config_patch: HashMap<String, String>) -> Result<App, DataError> {
        let mut apps = self.apps.write().await;
        let entry = apps.get_mut(name).ok_or_else(|| DataError::AppNotFound(name.to_string()))?;
        entry.app.merge_config(config_patch);
        Ok(entry.app.clone())
    }

    async fn remove_app(&self, name: &str) -> Result<(), DataError> {
        let mut apps = self.apps.write().await;
        let entry = apps.get(name).ok_or_else(|| DataError::AppNotFound(name.to_string()))?;
        if !entry.routes.is_empty() {
            return Err(DataError::AppHasRoutes(name.to_string()));
        }
        apps.remove(name);
        Ok(())
    }

    async fn get_route(&self, app_name: &str, path: &str) -> Result<Route, DataError> {
        let apps = self.apps.read().await;
        let entry = apps.get(app_name).ok_or_else(|| DataError::AppNotFound(app_name.to_string()))?;
        entry.routes.get(path).cloned().ok_or_else(|| DataError::RouteNotFound(path.to_string()))
    }

    async fn get_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>, DataError> {
        let apps = self.apps.read().await;
        let mut out = Vec::new();
        for entry in apps.values() {
            entry.routes.for_each(|_path, route| {
                if filter.matches(&route.app_name, &route.path, &route.image) {
                    out.push(route.clone());
                }
            });
        }
        Ok(out)
    }

    async fn get_routes_by_app(&self, app_name: &str) -> Result<Vec<Route>, DataError> {
        let apps = self.apps.read().await;
        let entry = apps.get(app_name).ok_or_else(|| DataError::AppNotFound(app_name.to_string()))?;
        let mut out = Vec::new();
        entry.routes.for_each(|_path, route| out.push(route.clone()));
        Ok(out)
    }

    async fn insert_route(&self, route: Route) -> Result<Route, DataError> {
        let mut apps = self.apps.write().await;
        // Apps are created implicitly on first route insert (spec §3 lifecycle).
        let entry = apps.entry(route.app_name.clone()).or_insert_with(|| AppEntry {
            app: App::new(route.app_name.clone()),
            routes: RouteTrie::new(),
        });
        let path = route.path.clone();
        let stored = route.clone();
        entry.routes.insert(&path, route).map_err(|e| match e {
            fnmesh_route::RouteError::Conflict => DataError::RouteConflict(path.clone()),
            fnmesh_route::RouteError::AlreadyExists => DataError::RouteAlreadyExists(path.clone()),
        })?;
        Ok(stored)
    }

    async fn update_route(
        &self,
        app_name: &str,
        path: &str,
        config_patch: HashMap<String, String>,
        headers_patch: HashMap<String, Vec<String>>,
    ) -> Result<Route, DataError> {
        let mut apps = self.apps.write().await;
        let entry = apps.get_mut(app_name).ok_or_else(|| DataError::AppNotFound(app_name.to_string()))?;
        let route = entry.routes.get_mut(path).ok_or_else(|| DataError::RouteNotFound(path.to_string()))?;
        route.merge_update(config_patch, headers_patch);
        Ok(route.clone())
    }

    async fn remove_route(&self, app_name: &str, path: &str) -> Result<(), DataError> {
        let mut apps = self.apps.write().await;
        let entry = apps.get_mut(app_name).ok_or_else(|| DataError::AppNotFound(app_name.to_string()))?;
        if entry.routes.delete(path) {
            Ok(())
        } else {
            Err(DataError::RouteNotFound(path.to_string()))
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DataError> {
        self.extras.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        Ok(self.extras.read().await.get(key).cloned())
    }
}

#[async_trait::async_trait]
impl RouteResolver for MemoryDatastore {
    async fn resolve(&self, app_name: &str, request_path: &str) -> Result<Option<ResolvedRoute>, DataError> {
        let apps = self.apps.read().await;
        let Some(entry) = apps.get(app_name) else {
            return Ok(None);
        };
        Ok(entry.routes.lookup(request_path).map(|m| ResolvedRoute { route: m.route.clone(), params: m.params }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RouteFormat, RouteType};

    fn sample_route(app: &str, path: &str) -> Route {
        Route {
            app_name: app.to_string(),
            path: path.to_string(),
            image: "iron/hello".to_string(),
            route_type: RouteType::Sync,
            format: RouteFormat::Default,
            memory: 128,
            cpu_shares: 0,
            timeout_secs: 30,
            idle_timeout_secs: 30,
            max_concurrency: 1,
            headers: HashMap::new(),
            config: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn insert_route_implicitly_creates_app() {
        let ds = MemoryDatastore::new();
        ds.insert_route(sample_route("myapp", "/hello")).await.unwrap();
        assert_eq!(ds.get_app("myapp").await.unwrap().name, "myapp");
    }

    #[tokio::test]
    async fn remove_app_with_routes_fails() {
        let ds = MemoryDatastore::new();
        ds.insert_route(sample_route("myapp", "/hello")).await.unwrap();
        let err = ds.remove_app("myapp").await.unwrap_err();
        assert!(matches!(err, DataError::AppHasRoutes(_)));
    }

    #[tokio::test]
    async fn remove_route_then_remove_app_succeeds() {
        let ds = MemoryDatastore::new();
        ds.insert_route(sample_route("myapp", "/hello")).await.unwrap();
        ds.remove_route("myapp", "/hello").await.unwrap();
        ds.remove_app("myapp").await.unwrap();
        assert!(matches!(ds.get_app("myapp").await.unwrap_err(), DataError::AppNotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_route_insert_fails() {
        let ds = MemoryDatastore::new();
        ds.insert_route(sample_route("myapp", "/hello")).await.unwrap();
        let err = ds.insert_route(sample_route("myapp", "/hello")).await.unwrap_err();
        assert!(matches!(err, DataError::RouteAlreadyExists(_)));
    }

    #[tokio::test]
    async fn resolve_finds_wildcard_route() {
        let ds = MemoryDatastore::new();
        ds.insert_route(sample_route("myapp", "/blogs/:id")).await.unwrap();
        let resolved = ds.resolve("myapp", "/blogs/123").await.unwrap().unwrap();
        assert_eq!(resolved.route.path, "/blogs/:id");
        assert_eq!(resolved.params, vec![("id".to_string(), "123".to_string())]);
    }

    #[tokio::test]
    async fn update_app_merges_config() {
        let ds = MemoryDatastore::new();
        ds.insert_app(App::new("myapp")).await.unwrap();
        let mut patch = HashMap::new();
        patch.insert("k".to_string(), "v".to_string());
        ds.update_app("myapp", patch).await.unwrap();
        assert_eq!(ds.get_app("myapp").await.unwrap().config.get("k"), Some(&"v".to_string()));
    }
}
