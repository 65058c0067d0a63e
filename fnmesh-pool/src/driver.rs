use fnmesh_store::ExecConfig;
use tokio_util::sync::CancellationToken;

/// Outcome of a single container invocation (spec §3's `Config.stdout` plus
/// the tagged-variant `Result {status, error, latency}` from §9).
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub status: ExecStatus,
    pub stdout: Vec<u8>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    Success,
    Timeout,
    Error,
}

impl ExecOutcome {
    pub fn success(stdout: Vec<u8>) -> Self {
        ExecOutcome { status: ExecStatus::Success, stdout, error: None }
    }

    pub fn timeout() -> Self {
        ExecOutcome { status: ExecStatus::Timeout, stdout: Vec::new(), error: Some("execution timed out".into()) }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ExecOutcome { status: ExecStatus::Error, stdout: Vec::new(), error: Some(message.into()) }
    }
}

/// Pluggable container backend the pool calls into for every task (spec
/// §4.6). Must honor `cancel` and report `Timeout` when it fires before
/// completion.
#[async_trait::async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn run(&self, config: &ExecConfig, cancel: CancellationToken) -> ExecOutcome;
}
