//! Entry point for every `/r/{app}/{path...}` request (spec component E).
//! Grounded in the teacher's [`r2e_core`] error-to-response mapping
//! ([`fnmesh_core::AppError`]) and `http` module shape, wired to the cache,
//! datastore, queue, worker pool, and listener fabric crates built
//! alongside it.

mod env;
mod resolve;

pub use resolve::RouteResolverCoalescer;

use axum::body::Bytes;
use axum::response::{IntoResponse, Response};
use fnmesh_cache::HotRouteCache;
use fnmesh_core::{envelope_with_call_id, AppError, CallId};
use fnmesh_listener::{DispatchContext, ListenerRegistry};
use fnmesh_pool::{ExecStatus, Priority, TaskRequest, WorkerPool};
use fnmesh_queue::Queue;
use fnmesh_store::{Datastore, ExecConfig, RouteResolver, RouteType, Task};
use http::{HeaderMap, Method, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Everything the dispatcher needs to resolve and route one request, already
/// extracted from the transport layer so this crate stays framework-agnostic
/// beyond `axum::response`/`axum::body`.
pub struct DispatchRequest {
    pub app_name: String,
    pub route_path: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub request_url: String,
    pub remote_addr: String,
    /// `POST`/`PUT` bodies stream in directly; `GET` callers pass the
    /// `payload` query parameter as the body instead (spec §4.5 step 2).
    pub body: Bytes,
}

/// The assembled dispatcher: cache + coalescing resolver in front of the
/// datastore, the worker pool for sync execution, the async queue for
/// async dispatch, and the listener fabric around both paths.
pub struct Dispatcher {
    datastore: Arc<dyn Datastore>,
    route_resolver: Arc<dyn RouteResolver>,
    resolver: RouteResolverCoalescer,
    queue: Arc<dyn Queue>,
    pool: Arc<WorkerPool>,
    listeners: Arc<ListenerRegistry>,
    max_stdout_bytes: usize,
}

impl Dispatcher {
    /// `datastore` and `route_resolver` are expected to be two trait-object
    /// views of the same backend (e.g. both cloned from one
    /// `Arc<Validator<MemoryDatastore>>`) so route resolution and app/route
    /// CRUD stay consistent.
    pub fn new(
        datastore: Arc<dyn Datastore>,
        route_resolver: Arc<dyn RouteResolver>,
        cache: Arc<HotRouteCache>,
        queue: Arc<dyn Queue>,
        pool: Arc<WorkerPool>,
        listeners: Arc<ListenerRegistry>,
        max_stdout_bytes: usize,
    ) -> Self {
        Dispatcher {
            datastore,
            route_resolver,
            resolver: RouteResolverCoalescer::new(cache),
            queue,
            pool,
            listeners,
            max_stdout_bytes,
        }
    }

    pub async fn dispatch(&self, req: DispatchRequest) -> Response {
        let call_id = CallId::generate(&req.remote_addr, &req.request_url, wall_time_nanos());

        let app = match self.datastore.get_app(&req.app_name).await {
            Ok(app) => app,
            Err(_) => return envelope_with_call_id(AppError::AppsNotFound(req.app_name.clone()), &call_id.0),
        };

        let resolved = match self.resolver.resolve(self.route_resolver.as_ref(), &req.app_name, &req.route_path).await {
            Ok(resolved) => resolved,
            Err(err) => return envelope_with_call_id(err, &call_id.0),
        };
        let route = resolved.route;

        let ctx = DispatchContext { call_id: call_id.0.clone(), app_name: req.app_name.clone(), route_path: route.path.clone() };
        self.listeners.fire_before_dispatch(&ctx).await;

        let env = env::build_env(&req.method, &route, &req.request_url, &app.config, &resolved.params, &req.headers);

        let response = match route.route_type {
            RouteType::Sync => self.dispatch_sync(&call_id, &route, env, req.body).await,
            RouteType::Async => self.dispatch_async(&call_id, &route, env, req.body).await,
        };

        self.listeners.fire_after_dispatch(&ctx).await;
        response
    }

    async fn dispatch_sync(&self, call_id: &CallId, route: &fnmesh_store::Route, env: HashMap<String, String>, body: Bytes) -> Response {
        let config = ExecConfig {
            id: call_id.0.clone(),
            app_name: route.app_name.clone(),
            path: route.path.clone(),
            image: route.image.clone(),
            env,
            format: route.format,
            timeout_secs: route.timeout_secs,
            idle_timeout_secs: route.idle_timeout_secs,
            memory: route.memory,
            max_concurrency: route.max_concurrency,
            stdin: body.to_vec(),
        };

        let cancel = CancellationToken::new();
        let timeout = Duration::from_secs(route.timeout_secs as u64);
        let cancel_on_timeout = cancel.clone();
        let timeout_guard = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel_on_timeout.cancel();
        });

        let (tx, rx) = oneshot::channel();
        if self.pool.submit(TaskRequest { priority: Priority::High, config, cancel, response_tx: tx }).await.is_err() {
            timeout_guard.abort();
            return envelope_with_call_id(AppError::Internal("worker pool is closed".into()), &call_id.0);
        }

        let outcome = rx.await;
        timeout_guard.abort();

        match outcome {
            Ok(outcome) if outcome.status == ExecStatus::Success && outcome.stdout.len() > self.max_stdout_bytes => {
                envelope_with_call_id(
                    AppError::OutputTooLarge(format!(
                        "stdout of {} bytes exceeded the {} byte limit",
                        outcome.stdout.len(),
                        self.max_stdout_bytes
                    )),
                    &call_id.0,
                )
            }
            Ok(outcome) if outcome.status == ExecStatus::Success => (StatusCode::OK, outcome.stdout).into_response(),
            Ok(outcome) if outcome.status == ExecStatus::Timeout => {
                envelope_with_call_id(AppError::RunnerTimeout(outcome.error.unwrap_or_default()), &call_id.0)
            }
            Ok(outcome) => envelope_with_call_id(AppError::Internal(outcome.error.unwrap_or_default()), &call_id.0),
            Err(_) => envelope_with_call_id(AppError::Internal("worker pool dropped the response channel".into()), &call_id.0),
        }
    }

    async fn dispatch_async(&self, call_id: &CallId, route: &fnmesh_store::Route, env: HashMap<String, String>, body: Bytes) -> Response {
        let task = Task {
            id: call_id.0.clone(),
            app_name: route.app_name.clone(),
            path: route.path.clone(),
            image: route.image.clone(),
            priority: 0,
            env,
            payload: body.to_vec(),
            delay_sec: 0,
            reserved_until: None,
        };

        match self.queue.push(task).await {
            Ok(_) => {
                let body = serde_json::json!({ "call_id": call_id.0 });
                (StatusCode::ACCEPTED, axum::Json(body)).into_response()
            }
            Err(err) => envelope_with_call_id(AppError::BadRequest(err.to_string()), &call_id.0),
        }
    }
}

fn wall_time_nanos() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fnmesh_listener::ListenerRegistry;
    use fnmesh_pool::ContainerDriver;
    use fnmesh_queue::MemoryQueue;
    use fnmesh_store::{App, MemoryDatastore, Route, RouteFormat};

    fn route(app: &str, path: &str, route_type: RouteType) -> Route {
        Route {
            app_name: app.into(),
            path: path.into(),
            image: "img".into(),
            route_type,
            format: RouteFormat::Default,
            memory: 128,
            cpu_shares: 0,
            timeout_secs: 5,
            idle_timeout_secs: 5,
            max_concurrency: 1,
            headers: HashMap::new(),
            config: HashMap::new(),
        }
    }

    fn request(app: &str, path: &str, body: &'static [u8]) -> DispatchRequest {
        DispatchRequest {
            app_name: app.into(),
            route_path: path.into(),
            method: Method::POST,
            headers: HeaderMap::new(),
            request_url: format!("http://x/r/{app}{path}"),
            remote_addr: "127.0.0.1".into(),
            body: Bytes::from_static(body),
        }
    }

    struct EchoDriver;

    #[async_trait::async_trait]
    impl ContainerDriver for EchoDriver {
        async fn run(&self, config: &ExecConfig, _cancel: CancellationToken) -> fnmesh_pool::ExecOutcome {
            fnmesh_pool::ExecOutcome::success(config.stdin.clone())
        }
    }

    fn make_dispatcher(driver: Arc<dyn ContainerDriver>) -> (Arc<MemoryDatastore>, Dispatcher) {
        make_dispatcher_with_limit(driver, 1024 * 1024)
    }

    fn make_dispatcher_with_limit(driver: Arc<dyn ContainerDriver>, max_stdout_bytes: usize) -> (Arc<MemoryDatastore>, Dispatcher) {
        let ds = Arc::new(MemoryDatastore::new());
        let datastore: Arc<dyn Datastore> = ds.clone();
        let route_resolver: Arc<dyn fnmesh_store::RouteResolver> = ds.clone();
        let cache = Arc::new(HotRouteCache::new(100));
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new(Duration::from_secs(5)));
        let pool = Arc::new(WorkerPool::new(8, driver));
        let listeners = Arc::new(ListenerRegistry::new());
        let dispatcher = Dispatcher::new(datastore, route_resolver, cache, queue, pool, listeners, max_stdout_bytes);
        (ds, dispatcher)
    }

    #[tokio::test]
    async fn missing_app_is_404() {
        let (_ds, dispatcher) = make_dispatcher(Arc::new(EchoDriver));
        let resp = dispatcher.dispatch(request("nope", "/hi", b"")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_route_is_404() {
        let (ds, dispatcher) = make_dispatcher(Arc::new(EchoDriver));
        ds.insert_app(App::new("myapp")).await.unwrap();
        let resp = dispatcher.dispatch(request("myapp", "/hi", b"")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sync_route_echoes_body_with_200() {
        let (ds, dispatcher) = make_dispatcher(Arc::new(EchoDriver));
        ds.insert_route(route("myapp", "/hi", RouteType::Sync)).await.unwrap();
        let resp = dispatcher.dispatch(request("myapp", "/hi", b"hello")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn async_route_returns_202_with_call_id() {
        let (ds, dispatcher) = make_dispatcher(Arc::new(EchoDriver));
        ds.insert_route(route("myapp", "/job", RouteType::Async)).await.unwrap();
        let resp = dispatcher.dispatch(request("myapp", "/job", b"payload")).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn oversized_stdout_is_413_not_a_truncated_200() {
        let (ds, dispatcher) = make_dispatcher_with_limit(Arc::new(EchoDriver), 4);
        ds.insert_route(route("myapp", "/hi", RouteType::Sync)).await.unwrap();
        let resp = dispatcher.dispatch(request("myapp", "/hi", b"way too much output")).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
