use crate::driver::ExecStatus;
use crate::pool::{Priority, TaskRequest, WorkerPool};
use fnmesh_queue::Queue;
use fnmesh_store::{Datastore, ExecConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// One per-node loop that reserves from the async queue and feeds the
/// worker pool at low priority (spec §4.7). At-least-once: a task is only
/// acked on success; any other outcome leaves the reservation to expire so
/// the task reappears.
pub struct AsyncRunner {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl AsyncRunner {
    /// Spawns the reserve loop immediately. `idle_poll` is the backoff when
    /// `reserve()` returns nothing.
    pub fn spawn(queue: Arc<dyn Queue>, pool: Arc<WorkerPool>, datastore: Arc<dyn Datastore>, idle_poll: Duration) -> Self {
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        tracker.spawn(run_loop(queue, pool, datastore, idle_poll, cancel.clone()));
        AsyncRunner { cancel, tracker }
    }

    /// Stop reserving and wait for the in-flight task to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_loop(queue: Arc<dyn Queue>, pool: Arc<WorkerPool>, datastore: Arc<dyn Datastore>, idle_poll: Duration, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let reserved = tokio::select! {
            _ = cancel.cancelled() => break,
            r = queue.reserve() => r,
        };

        let task = match reserved {
            Ok(Some(task)) => task,
            Ok(None) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle_poll) => continue,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "async runner: reserve failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(idle_poll) => continue,
                }
            }
        };

        let route = match datastore.get_route(&task.app_name, &task.path).await {
            Ok(route) => route,
            Err(err) => {
                tracing::warn!(task_id = %task.id, error = %err, "async runner: route lookup failed, leaving reservation to expire");
                continue;
            }
        };

        let mut env = task.env.clone();
        for (k, v) in &route.config {
            env.entry(k.clone()).or_insert_with(|| v.clone());
        }

        let config = ExecConfig {
            id: task.id.clone(),
            app_name: task.app_name.clone(),
            path: task.path.clone(),
            image: task.image.clone(),
            env,
            format: route.format,
            timeout_secs: route.timeout_secs,
            idle_timeout_secs: route.idle_timeout_secs,
            memory: route.memory,
            max_concurrency: route.max_concurrency,
            stdin: task.payload.clone(),
        };

        let task_cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let submitted = pool
            .submit(TaskRequest { priority: Priority::Low, config, cancel: task_cancel.clone(), response_tx: tx })
            .await;

        if submitted.is_err() {
            tracing::warn!(task_id = %task.id, "async runner: pool is closed, leaving reservation to expire");
            continue;
        }

        match rx.await {
            Ok(outcome) if outcome.status == ExecStatus::Success => {
                if let Err(err) = queue.delete(&task.id).await {
                    tracing::warn!(task_id = %task.id, error = %err, "async runner: ack failed");
                }
            }
            Ok(outcome) => {
                tracing::warn!(task_id = %task.id, status = ?outcome.status, "async runner: execution did not succeed, leaving reservation to expire");
            }
            Err(_) => {
                tracing::warn!(task_id = %task.id, "async runner: response channel dropped, leaving reservation to expire");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{ContainerDriver, ExecOutcome};
    use fnmesh_queue::MemoryQueue;
    use fnmesh_store::{MemoryDatastore, Route, RouteFormat, RouteType};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn route(app: &str, path: &str) -> Route {
        Route {
            app_name: app.into(),
            path: path.into(),
            image: "img".into(),
            route_type: RouteType::Async,
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

    fn task(id: &str, app: &str, path: &str) -> fnmesh_store::Task {
        fnmesh_store::Task {
            id: id.into(),
            app_name: app.into(),
            path: path.into(),
            image: "img".into(),
            priority: 0,
            env: HashMap::new(),
            payload: Vec::new(),
            delay_sec: 0,
            reserved_until: None,
        }
    }

    struct CountingDriver {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ContainerDriver for CountingDriver {
        async fn run(&self, _config: &fnmesh_store::ExecConfig, _cancel: CancellationToken) -> ExecOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ExecOutcome::success(Vec::new())
        }
    }

    #[tokio::test]
    async fn reserved_task_is_executed_and_acked() {
        let ds = Arc::new(MemoryDatastore::new());
        ds.insert_route(route("myapp", "/job")).await.unwrap();

        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new(Duration::from_secs(5)));
        queue.push(task("t1", "myapp", "/job")).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let pool = Arc::new(WorkerPool::new(8, Arc::new(CountingDriver { calls: calls.clone() })));

        let runner = AsyncRunner::spawn(queue.clone(), pool.clone(), ds, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.shutdown().await;
        pool.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(queue.delete("t1").await.is_err(), "task should already be acked");
    }
}
