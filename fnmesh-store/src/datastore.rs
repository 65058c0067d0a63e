use crate::error::DataError;
use crate::filter::{AppFilter, RouteFilter};
use crate::model::{App, Route};
use std::collections::HashMap;

/// Public datastore surface (spec §4.2). Backends (bolt/postgres/mysql/
/// in-memory) need only satisfy this contract.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    async fn get_app(&self, name: &str) -> Result<App, DataError>;
    async fn get_apps(&self, filter: &AppFilter) -> Result<Vec<App>, DataError>;
    async fn insert_app(&self, app: App) -> Result<App, DataError>;
    async fn update_app(&self, name: &str, config_patch: HashMap<String, String>) -> Result<App, DataError>;
    async fn remove_app(&self, name: &str) -> Result<(), DataError>;

    async fn get_route(&self, app_name: &str, path: &str) -> Result<Route, DataError>;
    async fn get_routes(&self, filter: &RouteFilter) -> Result<Vec<Route>, DataError>;
    async fn get_routes_by_app(&self, app_name: &str) -> Result<Vec<Route>, DataError>;
    async fn insert_route(&self, route: Route) -> Result<Route, DataError>;
    async fn update_route(
        &self,
        app_name: &str,
        path: &str,
        config_patch: HashMap<String, String>,
        headers_patch: HashMap<String, Vec<String>>,
    ) -> Result<Route, DataError>;
    async fn remove_route(&self, app_name: &str, path: &str) -> Result<(), DataError>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), DataError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, DataError>;
}

/// An owned copy of a trie match (spec §4.1's lookup result), detached from
/// the resolver's internal trie so it can cross an `await` boundary and be
/// cached by the dispatcher.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub route: Route,
    pub params: Vec<(String, String)>,
}

/// Longest-prefix match against the live route set of one app, used by the
/// dispatcher on a cache miss (spec §4.1 lookup semantics layered on §4.2's
/// contract). [`crate::memory::MemoryDatastore`] keeps a resident
/// [`fnmesh_route::RouteTrie`] per app and implements this directly.
#[async_trait::async_trait]
pub trait RouteResolver: Send + Sync {
    async fn resolve(&self, app_name: &str, request_path: &str) -> Result<Option<ResolvedRoute>, DataError>;
}
