//! Two-queue cooperative worker pool (spec component F) and the async-queue
//! runner that feeds it (spec component G).
//!
//! Grounded in the teacher's [`r2e_scheduler`] shape — a `CancellationToken`
//! owned by the runtime, handed out so callers can observe and trigger
//! shutdown — generalized from interval/cron jobs into per-task container
//! execution with strict two-level priority and at-least-once async retry.

mod driver;
mod pool;
mod runner;

pub use driver::{ContainerDriver, ExecOutcome, ExecStatus};
pub use pool::{PoolError, Priority, TaskRequest, WorkerPool};
pub use runner::AsyncRunner;
