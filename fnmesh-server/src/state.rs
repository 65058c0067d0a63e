use fnmesh_cache::HotRouteCache;
use fnmesh_core::CredentialKey;
use fnmesh_dispatch::Dispatcher;
use fnmesh_listener::ListenerRegistry;
use fnmesh_pool::{AsyncRunner, WorkerPool};
use fnmesh_queue::Queue;
use fnmesh_store::{Datastore, MemoryDatastore, RouteResolver, Validator};
use std::sync::Arc;

/// Everything the HTTP surface needs, captured once at startup and shared
/// by reference (spec §9: "process-wide configuration... captured into an
/// immutable struct at startup; all components receive it by reference" —
/// extended here to the whole service graph, not just config).
#[derive(Clone)]
pub struct AppState {
    pub datastore: Arc<dyn Datastore>,
    pub route_resolver: Arc<dyn RouteResolver>,
    pub cache: Arc<HotRouteCache>,
    pub queue: Arc<dyn Queue>,
    pub pool: Arc<WorkerPool>,
    pub listeners: Arc<ListenerRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub credential_key: Arc<CredentialKey>,
    // Kept alive for the lifetime of the server; dropped on shutdown.
    pub runner: Arc<AsyncRunner>,
}

pub fn new_backend() -> Arc<Validator<MemoryDatastore>> {
    Arc::new(Validator::new(Arc::new(MemoryDatastore::new())))
}
