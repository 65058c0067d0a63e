mod driver;
mod routes;
mod state;

use driver::ProcessDriver;
use fnmesh_cache::HotRouteCache;
use fnmesh_core::{telemetry, CredentialKey, FnMeshConfig};
use fnmesh_listener::ListenerRegistry;
use fnmesh_pool::{AsyncRunner, WorkerPool};
use fnmesh_queue::{MemoryQueue, Queue};
use fnmesh_store::{Datastore, RouteResolver};
use state::{new_backend, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

const X_REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_STDOUT_BYTES: usize = 1024 * 1024;
const WORKER_POOL_CAPACITY: usize = 256;
const ASYNC_RUNNER_IDLE_POLL: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() {
    let config = FnMeshConfig::from_env().expect("invalid configuration");
    telemetry::init_tracing(&config.log_level);

    let backend = new_backend();
    let datastore: Arc<dyn Datastore> = backend.clone();
    let route_resolver: Arc<dyn RouteResolver> = backend.clone();

    let cache = Arc::new(HotRouteCache::new(config.hot_route_cache_size));
    cache.prime(datastore.as_ref()).await;

    let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new(Duration::from_secs(config.reserve_timeout_secs)));
    let pool = Arc::new(WorkerPool::new(WORKER_POOL_CAPACITY, Arc::new(ProcessDriver::new(MAX_STDOUT_BYTES))));
    let listeners = Arc::new(ListenerRegistry::new());

    let dispatcher = Arc::new(fnmesh_dispatch::Dispatcher::new(
        datastore.clone(),
        route_resolver.clone(),
        cache.clone(),
        queue.clone(),
        pool.clone(),
        listeners.clone(),
        MAX_STDOUT_BYTES,
    ));

    let runner = Arc::new(AsyncRunner::spawn(queue.clone(), pool.clone(), datastore.clone(), ASYNC_RUNNER_IDLE_POLL));

    let app_state = AppState {
        datastore,
        route_resolver,
        cache,
        queue,
        pool: pool.clone(),
        listeners,
        dispatcher,
        credential_key: Arc::new(CredentialKey::generate()),
        runner: runner.clone(),
    };

    let request_id_header = axum::http::HeaderName::from_static(X_REQUEST_ID_HEADER);
    let app = routes::router(app_state)
        .layer(telemetry::default_trace())
        .layer(telemetry::default_cors())
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    tracing::info!(%addr, "fnmesh-server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    runner.shutdown().await;
    pool.shutdown().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
