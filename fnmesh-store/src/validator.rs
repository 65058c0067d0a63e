use crate::datastore::{Datastore, ResolvedRoute, RouteResolver};
use crate::error::DataError;
use crate::filter::{AppFilter, RouteFilter};
use crate::model::{App, Route};
use std::collections::HashMap;
use std::sync::Arc;

/// Wraps a [`Datastore`] backend and enforces the precondition errors of
/// spec §4.2 before delegating: `DatastoreEmptyApp`, `DatastoreEmptyAppName`,
/// `DatastoreEmptyRoute`, `DatastoreEmptyRoutePath`, `DatastoreEmptyKey`.
pub struct Validator<D: Datastore> {
    inner: Arc<D>,
}

impl<D: Datastore> Validator<D> {
    pub fn new(inner: Arc<D>) -> Self {
        Validator { inner }
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<(), DataError> {
    if value.is_empty() {
        Err(DataError::Invalid(format!("{what} must not be empty")))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl<D: Datastore> Datastore for Validator<D> {
    async fn get_app(&self, name: &str) -> Result<App, DataError> {
        require_non_empty(name, "app name")?;
        self.inner.get_app(name).await
    }

    async fn get_apps(&self, filter: &AppFilter) -> Result<Vec<App>, DataError> {
        self.inner.get_apps(filter).await
    }

    async fn insert_app(&self, app: App) -> Result<App, DataError> {
        require_non_empty(&app.name, "app name")?;
        self.inner.insert_app(app).await
    }

    async fn update_app(&self, name: &str, config_patch: HashMap<String, String>) -> Result<App, DataError> {
        require_non_empty(name, "app name")?;
        self.inner.update_app(name, config_patch).await
    }

    async fn remove_app(&self, name: &str) -> Result<(), DataError> {
        require_non_empty(name, "app name")?;
        self.inner.remove_app(name).await
    }

    async fn get_route(&self, app_name: &str, path: &str) -> Result<Route, DataError> {
        require_non_empty(app_name, "app name")?;
        require_non_empty(path, "route path")?;
        self.inner.get_route(app_name, path).await
    }

    async fn get_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>, DataError> {
        self.inner.get_routes(filter).await
    }

    async fn get_routes_by_app(&self, app_name: &str) -> Result<Vec<Route>, DataError> {
        require_non_empty(app_name, "app name")?;
        self.inner.get_routes_by_app(app_name).await
    }

    async fn insert_route(&self, route: Route) -> Result<Route, DataError> {
        require_non_empty(&route.app_name, "app name")?;
        require_non_empty(&route.path, "route path")?;
        if !route.path.starts_with('/') {
            return Err(DataError::Invalid("route path must begin with /".into()));
        }
        self.inner.insert_route(route).await
    }

    async fn update_route(
        &self,
        app_name: &str,
        path: &str,
        config_patch: HashMap<String, String>,
        headers_patch: HashMap<String, Vec<String>>,
    ) -> Result<Route, DataError> {
        require_non_empty(app_name, "app name")?;
        require_non_empty(path, "route path")?;
        self.inner.update_route(app_name, path, config_patch, headers_patch).await
    }

    async fn remove_route(&self, app_name: &str, path: &str) -> Result<(), DataError> {
        require_non_empty(app_name, "app name")?;
        require_non_empty(path, "route path")?;
        self.inner.remove_route(app_name, path).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DataError> {
        require_non_empty(key, "key")?;
        self.inner.put(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError> {
        require_non_empty(key, "key")?;
        self.inner.get(key).await
    }
}

/// Forwards to the inner backend unchanged — route resolution has no
/// emptiness preconditions of its own beyond what [`Datastore::get_route`]
/// already enforces.
#[async_trait::async_trait]
impl<D: Datastore + RouteResolver> RouteResolver for Validator<D> {
    async fn resolve(&self, app_name: &str, request_path: &str) -> Result<Option<ResolvedRoute>, DataError> {
        self.inner.resolve(app_name, request_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatastore;

    #[tokio::test]
    async fn rejects_empty_app_name() {
        let v = Validator::new(Arc::new(MemoryDatastore::new()));
        let err = v.get_app("").await.unwrap_err();
        assert!(matches!(err, DataError::Invalid(_)));
    }

    #[tokio::test]
    async fn rejects_empty_route_path() {
        let v = Validator::new(Arc::new(MemoryDatastore::new()));
        let err = v.get_route("app", "").await.unwrap_err();
        assert!(matches!(err, DataError::Invalid(_)));
    }

    #[tokio::test]
    async fn delegates_when_valid() {
        let v = Validator::new(Arc::new(MemoryDatastore::new()));
        v.insert_app(App::new("myapp")).await.unwrap();
        assert_eq!(v.get_app("myapp").await.unwrap().name, "myapp");
    }
}
