use crate::QueueError;
use fnmesh_store::Task;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Reservation {
    task: Task,
    priority: u8,
    expires_at: Instant,
}

struct Delayed {
    eligible_at: Instant,
    task: Task,
}

struct State {
    // index == priority (0, 1, 2); reserve() drains index 2 first.
    queues: [VecDeque<Task>; 3],
    delayed: Vec<Delayed>,
    reserved: HashMap<String, Reservation>,
}

impl State {
    fn new() -> Self {
        State { queues: [VecDeque::new(), VecDeque::new(), VecDeque::new()], delayed: Vec::new(), reserved: HashMap::new() }
    }

    /// Move any delayed task whose eligibility has arrived onto its priority
    /// queue, and any timed-out reservation back to the *head* of its
    /// priority queue (spec §4.4: "must not jump behind newer arrivals of
    /// the same priority").
    fn sweep(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].eligible_at <= now {
                let entry = self.delayed.remove(i);
                self.queues[entry.task.priority as usize].push_back(entry.task);
            } else {
                i += 1;
            }
        }

        let expired: Vec<String> = self
            .reserved
            .iter()
            .filter(|(_, r)| r.expires_at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(r) = self.reserved.remove(&id) {
                self.queues[r.priority as usize].push_front(r.task);
            }
        }
    }
}

/// In-memory [`crate::Queue`] backend. A background sweeper (spawned in
/// [`MemoryQueue::new`]) periodically promotes due delayed tasks and
/// re-enqueues timed-out reservations; [`MemoryQueue::close`] cancels it.
pub struct MemoryQueue {
    state: Arc<Mutex<State>>,
    reserve_timeout: Duration,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryQueue {
    pub fn new(reserve_timeout: Duration) -> Self {
        let state = Arc::new(Mutex::new(State::new()));
        let cancel = CancellationToken::new();

        let tick = (reserve_timeout / 4).max(Duration::from_millis(10));
        let sweeper = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(tick) => {
                            let mut guard = state.lock().expect("queue mutex poisoned");
                            guard.sweep(Instant::now());
                        }
                    }
                }
            })
        };

        MemoryQueue { state, reserve_timeout, cancel, sweeper: Mutex::new(Some(sweeper)) }
    }
}

impl Drop for MemoryQueue {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait::async_trait]
impl crate::Queue for MemoryQueue {
    async fn push(&self, task: Task) -> Result<Task, QueueError> {
        if !task.is_valid() {
            return Err(QueueError::Invalid(format!("task {:?} has empty id or invalid priority", task.id)));
        }
        let mut state = self.state.lock().expect("queue mutex poisoned");
        let stored = task.clone();
        if task.delay_sec > 0 {
            let eligible_at = Instant::now() + Duration::from_secs(task.delay_sec as u64);
            state.delayed.push(Delayed { eligible_at, task });
        } else {
            state.queues[task.priority as usize].push_back(task);
        }
        Ok(stored)
    }

    async fn reserve(&self) -> Result<Option<Task>, QueueError> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.sweep(Instant::now());

        for priority in (0..=2u8).rev() {
            if let Some(mut task) = state.queues[priority as usize].pop_front() {
                let expires_at = Instant::now() + self.reserve_timeout;
                let expires_unix = SystemTime::now() + self.reserve_timeout;
                task.reserved_until = expires_unix.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs());
                let out = task.clone();
                state.reserved.insert(task.id.clone(), Reservation { task, priority, expires_at });
                return Ok(Some(out));
            }
        }
        Ok(None)
    }

    async fn delete(&self, task_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().expect("queue mutex poisoned");
        state.sweep(Instant::now());
        if state.reserved.remove(task_id).is_some() {
            Ok(())
        } else {
            Err(QueueError::TaskNotReserved(task_id.to_string()))
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
        let handle = self.sweeper.lock().expect("queue mutex poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Queue;
    use std::collections::HashMap;

    fn task(id: &str, priority: u8) -> Task {
        Task {
            id: id.to_string(),
            app_name: "myapp".into(),
            path: "/job".into(),
            image: "img".into(),
            priority,
            env: HashMap::new(),
            payload: Vec::new(),
            delay_sec: 0,
            reserved_until: None,
        }
    }

    #[tokio::test]
    async fn fifo_within_same_priority() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        q.push(task("a", 0)).await.unwrap();
        q.push(task("b", 0)).await.unwrap();
        assert_eq!(q.reserve().await.unwrap().unwrap().id, "a");
        assert_eq!(q.reserve().await.unwrap().unwrap().id, "b");
    }

    #[tokio::test]
    async fn higher_priority_drains_first() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        q.push(task("low", 0)).await.unwrap();
        q.push(task("high", 2)).await.unwrap();
        assert_eq!(q.reserve().await.unwrap().unwrap().id, "high");
        assert_eq!(q.reserve().await.unwrap().unwrap().id, "low");
    }

    #[tokio::test]
    async fn empty_queue_reserve_returns_none() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        assert!(q.reserve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_without_reservation_fails() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        let err = q.delete("nope").await.unwrap_err();
        assert_eq!(err, QueueError::TaskNotReserved("nope".to_string()));
    }

    #[tokio::test]
    async fn reserve_then_delete_acks() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        q.push(task("a", 0)).await.unwrap();
        q.reserve().await.unwrap();
        q.delete("a").await.unwrap();
        assert!(q.reserve().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reservation_timeout_makes_task_visible_again() {
        let q = MemoryQueue::new(Duration::from_millis(50));
        q.push(task("a", 0)).await.unwrap();
        let reserved = q.reserve().await.unwrap().unwrap();
        assert_eq!(reserved.id, "a");
        tokio::time::sleep(Duration::from_millis(50 * 20)).await;
        let reserved_again = q.reserve().await.unwrap().unwrap();
        assert_eq!(reserved_again.id, "a");
    }

    #[tokio::test]
    async fn invalid_task_rejected() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        let err = q.push(task("", 0)).await.unwrap_err();
        assert!(matches!(err, QueueError::Invalid(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let q = MemoryQueue::new(Duration::from_secs(2));
        q.close().await;
        q.close().await;
    }
}
