use crate::driver::{ContainerDriver, ExecOutcome};
use fnmesh_store::ExecConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Strict two-level priority (spec §4.6): `High` always drains before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The inbound channel's producer side was dropped, or the pool is shut down.
    Closed,
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Closed => write!(f, "worker pool is closed"),
        }
    }
}

impl std::error::Error for PoolError {}

/// One unit of work submitted to the pool (spec §4.6's `TaskRequest`).
pub struct TaskRequest {
    pub priority: Priority,
    pub config: ExecConfig,
    pub cancel: CancellationToken,
    pub response_tx: oneshot::Sender<ExecOutcome>,
}

struct Queues {
    high: VecDeque<TaskRequest>,
    low: VecDeque<TaskRequest>,
    closed: bool,
}

/// Two-queue cooperative dispatcher feeding an unbounded pool of per-task
/// workers. `submit` is the producer side of a bounded inbound channel — it
/// blocks (async) when the channel is full, which is the pool's only
/// backpressure beyond a route's own `max_concurrency` semaphore (applied by
/// callers before `submit`, per spec §9's open question).
pub struct WorkerPool {
    inbound: mpsc::Sender<TaskRequest>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl WorkerPool {
    /// `inbound_capacity` bounds the producer-facing channel (backpressure).
    pub fn new(inbound_capacity: usize, driver: Arc<dyn ContainerDriver>) -> Self {
        let (tx, rx) = mpsc::channel(inbound_capacity);
        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        let queues = Arc::new(Mutex::new(Queues { high: VecDeque::new(), low: VecDeque::new(), closed: false }));
        let notify = Arc::new(Notify::new());

        tracker.spawn(dispatch_loop(rx, queues.clone(), notify.clone(), cancel.clone()));
        tracker.spawn(pop_loop(queues, notify, cancel.clone(), driver, tracker.clone()));

        WorkerPool { inbound: tx, cancel, tracker }
    }

    /// Enqueue a task. Blocks if the inbound channel is at capacity.
    pub async fn submit(&self, req: TaskRequest) -> Result<(), PoolError> {
        self.inbound.send(req).await.map_err(|_| PoolError::Closed)
    }

    /// Signal shutdown and wait for every in-flight task to finish (the
    /// `WaitGroup` of spec §4.6).
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Consumes the inbound channel and pushes each request into its priority
/// queue, waking the pop loop.
async fn dispatch_loop(mut rx: mpsc::Receiver<TaskRequest>, queues: Arc<Mutex<Queues>>, notify: Arc<Notify>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            req = rx.recv() => {
                match req {
                    Some(req) => {
                        let mut q = queues.lock().expect("pool queue mutex poisoned");
                        match req.priority {
                            Priority::High => q.high.push_back(req),
                            Priority::Low => q.low.push_back(req),
                        }
                        drop(q);
                        notify.notify_one();
                    }
                    None => break,
                }
            }
        }
    }
    let mut q = queues.lock().expect("pool queue mutex poisoned");
    q.closed = true;
    drop(q);
    notify.notify_one();
}

/// Pops high before low, FIFO within each, and spawns one task per request
/// that calls the driver and discards the result if nobody is listening.
async fn pop_loop(
    queues: Arc<Mutex<Queues>>,
    notify: Arc<Notify>,
    cancel: CancellationToken,
    driver: Arc<dyn ContainerDriver>,
    tracker: TaskTracker,
) {
    loop {
        let next = loop {
            let should_wait = {
                let mut q = queues.lock().expect("pool queue mutex poisoned");
                if let Some(req) = q.high.pop_front().or_else(|| q.low.pop_front()) {
                    break Some(req);
                }
                if q.closed || cancel.is_cancelled() {
                    break None;
                }
                true
            };
            if should_wait {
                tokio::select! {
                    _ = notify.notified() => {}
                    _ = cancel.cancelled() => {}
                }
            }
        };

        let Some(req) = next else { break };
        let driver = driver.clone();
        tracker.spawn(async move {
            let outcome = driver.run(&req.config, req.cancel).await;
            // Non-blocking: a dropped receiver (caller stopped listening)
            // means the result is silently discarded, per spec §4.6.
            let _ = req.response_tx.send(outcome);
        });
    }
}
