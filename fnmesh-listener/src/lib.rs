//! Lifecycle hooks for apps, routes, and dispatch (spec component H).
//!
//! Grounded in the teacher's [`r2e_events`] bus shape — an ordered list of
//! handlers behind one lock, invoked in registration order — generalized
//! from fire-and-forget pub/sub into three typed, sequentially-awaited
//! listener kinds with Before/After abort semantics (spec §4.8, §9: "replace
//! reflective plugin loading with an explicit registration API at startup").

use async_trait::async_trait;
use fnmesh_core::AppError;
use fnmesh_store::{App, Route};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Hook for app lifecycle writes. Default methods are no-ops so a listener
/// only needs to implement what it cares about.
#[async_trait]
pub trait AppListener: Send + Sync {
    async fn before_create(&self, _app: &App) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_create(&self, _app: &App) {}

    async fn before_update(&self, _name: &str, _patch: &HashMap<String, String>) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_update(&self, _app: &App) {}

    async fn before_delete(&self, _name: &str) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_delete(&self, _name: &str) {}
}

/// Hook for route lifecycle writes.
#[async_trait]
pub trait RouteListener: Send + Sync {
    async fn before_create(&self, _route: &Route) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_create(&self, _route: &Route) {}

    async fn before_update(&self, _app_name: &str, _path: &str) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_update(&self, _route: &Route) {}

    async fn before_delete(&self, _app_name: &str, _path: &str) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_delete(&self, _app_name: &str, _path: &str) {}
}

/// Context available to dispatch hooks: enough to log and to veto, without
/// exposing the dispatcher's internals.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub call_id: String,
    pub app_name: String,
    pub route_path: String,
}

/// Hook fired around every request dispatch (sync or async).
#[async_trait]
pub trait RunnerListener: Send + Sync {
    async fn before_dispatch(&self, _ctx: &DispatchContext) -> Result<(), AppError> {
        Ok(())
    }
    async fn after_dispatch(&self, _ctx: &DispatchContext) -> Result<(), AppError> {
        Ok(())
    }
}

/// Free-form pre-handler chain, run before route resolution.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &DispatchContext) -> Result<(), AppError>;
}

/// Ordered registries for all three listener kinds, each guarded by its own
/// lock (spec §4.8: "a short list registered at startup").
#[derive(Default)]
pub struct ListenerRegistry {
    app_listeners: RwLock<Vec<Arc<dyn AppListener>>>,
    route_listeners: RwLock<Vec<Arc<dyn RouteListener>>>,
    runner_listeners: RwLock<Vec<Arc<dyn RunnerListener>>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_app_listener(&self, listener: Arc<dyn AppListener>) {
        self.app_listeners.write().await.push(listener);
    }

    pub async fn register_route_listener(&self, listener: Arc<dyn RouteListener>) {
        self.route_listeners.write().await.push(listener);
    }

    pub async fn register_runner_listener(&self, listener: Arc<dyn RunnerListener>) {
        self.runner_listeners.write().await.push(listener);
    }

    pub async fn register_middleware(&self, mw: Arc<dyn Middleware>) {
        self.middleware.write().await.push(mw);
    }

    /// Run every `Before*` app listener in order; the first error aborts
    /// with that error (the caller maps it to `500`, per spec §4.8).
    pub async fn fire_app_before_create(&self, app: &App) -> Result<(), AppError> {
        for l in self.app_listeners.read().await.iter() {
            l.before_create(app).await?;
        }
        Ok(())
    }

    pub async fn fire_app_after_create(&self, app: &App) {
        for l in self.app_listeners.read().await.iter() {
            l.after_create(app).await;
        }
    }

    pub async fn fire_app_before_update(&self, name: &str, patch: &HashMap<String, String>) -> Result<(), AppError> {
        for l in self.app_listeners.read().await.iter() {
            l.before_update(name, patch).await?;
        }
        Ok(())
    }

    pub async fn fire_app_after_update(&self, app: &App) {
        for l in self.app_listeners.read().await.iter() {
            l.after_update(app).await;
        }
    }

    pub async fn fire_app_before_delete(&self, name: &str) -> Result<(), AppError> {
        for l in self.app_listeners.read().await.iter() {
            l.before_delete(name).await?;
        }
        Ok(())
    }

    pub async fn fire_app_after_delete(&self, name: &str) {
        for l in self.app_listeners.read().await.iter() {
            l.after_delete(name).await;
        }
    }

    pub async fn fire_route_before_create(&self, route: &Route) -> Result<(), AppError> {
        for l in self.route_listeners.read().await.iter() {
            l.before_create(route).await?;
        }
        Ok(())
    }

    pub async fn fire_route_after_create(&self, route: &Route) {
        for l in self.route_listeners.read().await.iter() {
            l.after_create(route).await;
        }
    }

    pub async fn fire_route_before_update(&self, app_name: &str, path: &str) -> Result<(), AppError> {
        for l in self.route_listeners.read().await.iter() {
            l.before_update(app_name, path).await?;
        }
        Ok(())
    }

    pub async fn fire_route_after_update(&self, route: &Route) {
        for l in self.route_listeners.read().await.iter() {
            l.after_update(route).await;
        }
    }

    pub async fn fire_route_before_delete(&self, app_name: &str, path: &str) -> Result<(), AppError> {
        for l in self.route_listeners.read().await.iter() {
            l.before_delete(app_name, path).await?;
        }
        Ok(())
    }

    pub async fn fire_route_after_delete(&self, app_name: &str, path: &str) {
        for l in self.route_listeners.read().await.iter() {
            l.after_delete(app_name, path).await;
        }
    }

    /// Unlike the app/route Before hooks, dispatch-level hooks never abort
    /// the request (spec §4.5: "listener errors are logged but do not abort
    /// dispatch") — a stricter veto would let one misbehaving listener take
    /// the whole request path down.
    pub async fn fire_before_dispatch(&self, ctx: &DispatchContext) {
        for mw in self.middleware.read().await.iter() {
            if let Err(err) = mw.handle(ctx).await {
                tracing::warn!(call_id = %ctx.call_id, error = %err, "middleware failed");
            }
        }
        for l in self.runner_listeners.read().await.iter() {
            if let Err(err) = l.before_dispatch(ctx).await {
                tracing::warn!(call_id = %ctx.call_id, error = %err, "before-dispatch listener failed");
            }
        }
    }

    pub async fn fire_after_dispatch(&self, ctx: &DispatchContext) {
        for l in self.runner_listeners.read().await.iter() {
            if let Err(err) = l.after_dispatch(ctx).await {
                tracing::warn!(call_id = %ctx.call_id, error = %err, "after-dispatch listener failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Recorder {
        order: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait]
    impl AppListener for Recorder {
        async fn before_create(&self, _app: &App) -> Result<(), AppError> {
            self.order.lock().unwrap().push(self.tag);
            Ok(())
        }
    }

    #[tokio::test]
    async fn app_listeners_fire_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.register_app_listener(Arc::new(Recorder { order: order.clone(), tag: "first" })).await;
        registry.register_app_listener(Arc::new(Recorder { order: order.clone(), tag: "second" })).await;

        registry.fire_app_before_create(&App::new("myapp")).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    struct Rejecting;

    #[async_trait]
    impl AppListener for Rejecting {
        async fn before_create(&self, _app: &App) -> Result<(), AppError> {
            Err(AppError::Internal("listener vetoed".into()))
        }
    }

    #[tokio::test]
    async fn before_error_aborts_and_skips_later_listeners() {
        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingListener(Arc<AtomicUsize>);
        #[async_trait]
        impl AppListener for CountingListener {
            async fn before_create(&self, _app: &App) -> Result<(), AppError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let registry = ListenerRegistry::new();
        registry.register_app_listener(Arc::new(Rejecting)).await;
        registry.register_app_listener(Arc::new(CountingListener(calls.clone()))).await;

        let err = registry.fire_app_before_create(&App::new("myapp")).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0, "listener after the rejecting one must not run");
    }

    struct FailingAfter;

    #[async_trait]
    impl RunnerListener for FailingAfter {
        async fn after_dispatch(&self, _ctx: &DispatchContext) -> Result<(), AppError> {
            Err(AppError::Internal("boom".into()))
        }
    }

    #[tokio::test]
    async fn after_dispatch_error_is_swallowed() {
        let registry = ListenerRegistry::new();
        registry.register_runner_listener(Arc::new(FailingAfter)).await;
        let ctx = DispatchContext { call_id: "c1".into(), app_name: "myapp".into(), route_path: "/job".into() };
        // must not panic or propagate
        registry.fire_after_dispatch(&ctx).await;
    }
}
