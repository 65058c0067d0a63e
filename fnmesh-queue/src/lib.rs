//! Three-level priority FIFO with reserve-ack semantics (spec component D).
//! Grounded in the teacher's [`r2e_events`] handler-registry shape (ordered
//! registration, dispatched under one lock) generalized from pub/sub into a
//! pluggable [`Queue`] trait with one in-memory backend.
//!
//! **Open question resolved** (spec §4.4 doesn't fix a direction): priority
//! ranks ascending by value — `2` drains before `1` drains before `0`.

mod memory;

pub use memory::MemoryQueue;

use fnmesh_store::Task;

/// Errors from [`Queue`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// `Push` received a task with an empty id or an out-of-range priority.
    Invalid(String),
    /// `Delete` was called for a task not currently reserved by anyone (or
    /// whose reservation already expired and was claimed by someone else).
    TaskNotReserved(String),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::Invalid(m) => write!(f, "invalid task: {m}"),
            QueueError::TaskNotReserved(id) => write!(f, "task not reserved: {id}"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Pluggable async-queue backend (spec §4.4). Four backends exist in the
/// original system (in-memory, Bolt, Redis, IronMQ); only the contract and
/// one in-memory implementation are shipped here.
#[async_trait::async_trait]
pub trait Queue: Send + Sync {
    /// Validate and store `task`, honoring `delay_sec`. Returns the stored task.
    async fn push(&self, task: Task) -> Result<Task, QueueError>;

    /// Return the highest-priority eligible task not currently reserved,
    /// marking it reserved for the configured reservation timeout. `Ok(None)`
    /// means the queue is empty of eligible work right now.
    async fn reserve(&self) -> Result<Option<Task>, QueueError>;

    /// Acknowledge a previously reserved task by id.
    async fn delete(&self, task_id: &str) -> Result<(), QueueError>;

    /// Stop any background timers. Idempotent.
    async fn close(&self);
}
