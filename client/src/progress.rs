use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_channel::Sender;
use parking_lot::Mutex;
use pgtm_core::{
    ClientError,
    snapshots::{OperationStatus, ProgressState, SnapshotId, SnapshotProgress},
};
use tokio::task::JoinHandle;

use crate::{BackendClient, ClientResult};

pub const OPERATION_FAILED_MESSAGE: &str = "Snapshot operation failed";
pub const POLLING_NETWORK_ERROR_MESSAGE: &str = "Network error while checking progress";

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Message a poller sends to its owner. `token` identifies the poller
/// instance, so reports from a disposed poller can be told apart from
/// those of a successor tracking the same snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollerReport {
    Progress {
        token: u64,
        snapshot_id: SnapshotId,
        state: ProgressState,
    },
    Completed {
        token: u64,
        snapshot_id: SnapshotId,
    },
    /// The backend reported the operation as failed.
    Failed {
        token: u64,
        snapshot_id: SnapshotId,
        message: String,
    },
    /// Polling itself broke down; the operation's fate is unknown.
    Interrupted {
        token: u64,
        snapshot_id: SnapshotId,
        message: String,
    },
}

impl PollerReport {
    pub fn token(&self) -> u64 {
        match self {
            PollerReport::Progress { token, .. }
            | PollerReport::Completed { token, .. }
            | PollerReport::Failed { token, .. }
            | PollerReport::Interrupted { token, .. } => *token,
        }
    }

    pub fn snapshot_id(&self) -> &str {
        match self {
            PollerReport::Progress { snapshot_id, .. }
            | PollerReport::Completed { snapshot_id, .. }
            | PollerReport::Failed { snapshot_id, .. }
            | PollerReport::Interrupted { snapshot_id, .. } => snapshot_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollerReport::Progress { .. })
    }
}

struct Shared {
    alive: bool,
    state: ProgressState,
}

/// Polls one snapshot's progress until it completes, fails, or the poller
/// is disposed.
///
/// Every query and every report is gated on a liveness flag that
/// [`ProgressPoller::dispose`] clears under the same lock, so once `dispose`
/// returns no further query starts and no further report is sent.
pub struct ProgressPoller {
    token: u64,
    snapshot_id: SnapshotId,
    shared: Arc<Mutex<Shared>>,
    task: Option<JoinHandle<()>>,
}

impl ProgressPoller {
    /// Starts polling on the current tokio runtime. The first query goes out
    /// immediately.
    pub fn spawn<B>(
        backend: Arc<B>,
        snapshot_id: impl Into<SnapshotId>,
        interval: Duration,
        reports: Sender<PollerReport>,
    ) -> Self
    where
        B: BackendClient + ?Sized + 'static,
    {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let snapshot_id = snapshot_id.into();
        let shared = Arc::new(Mutex::new(Shared {
            alive: true,
            state: ProgressState::starting(),
        }));
        let task = tokio::spawn(poll_until_terminal(
            backend,
            PollTarget {
                token,
                snapshot_id: snapshot_id.clone(),
                interval,
                shared: shared.clone(),
                reports,
            },
        ));
        Self {
            token,
            snapshot_id,
            shared,
            task: Some(task),
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn state(&self) -> ProgressState {
        self.shared.lock().state.clone()
    }

    /// False once a terminal report went out or the poller was disposed.
    pub fn is_active(&self) -> bool {
        self.shared.lock().alive
    }

    pub fn dispose(&mut self) {
        let was_alive = std::mem::replace(&mut self.shared.lock().alive, false);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if was_alive {
            tracing::debug!(snapshot_id = %self.snapshot_id, "progress poller disposed");
        }
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct PollTarget {
    token: u64,
    snapshot_id: SnapshotId,
    interval: Duration,
    shared: Arc<Mutex<Shared>>,
    reports: Sender<PollerReport>,
}

enum Step {
    Continue,
    Stop,
}

async fn poll_until_terminal<B>(backend: Arc<B>, target: PollTarget)
where
    B: BackendClient + ?Sized,
{
    let mut queries = 0u32;
    loop {
        if !target.is_alive() {
            return;
        }
        queries += 1;
        tracing::debug!(snapshot_id = %target.snapshot_id, queries, "querying snapshot progress");
        let outcome = backend.snapshot_progress(&target.snapshot_id).await;
        match target.settle(outcome) {
            Step::Continue => tokio::time::sleep(target.interval).await,
            Step::Stop => return,
        }
    }
}

impl PollTarget {
    fn is_alive(&self) -> bool {
        self.shared.lock().alive
    }

    fn settle(&self, outcome: ClientResult<SnapshotProgress>) -> Step {
        let mut shared = self.shared.lock();
        if !shared.alive {
            return Step::Stop;
        }

        let token = self.token;
        let snapshot_id = self.snapshot_id.clone();
        let report = match outcome {
            Ok(progress) => {
                shared.state = ProgressState::from(&progress);
                match progress.status {
                    OperationStatus::Completed => PollerReport::Completed { token, snapshot_id },
                    OperationStatus::Failed => {
                        let message = if progress.message.trim().is_empty() {
                            OPERATION_FAILED_MESSAGE.to_string()
                        } else {
                            progress.message
                        };
                        PollerReport::Failed {
                            token,
                            snapshot_id,
                            message,
                        }
                    }
                    _ => PollerReport::Progress {
                        token,
                        snapshot_id,
                        state: shared.state.clone(),
                    },
                }
            }
            Err(err) => {
                tracing::warn!(
                    snapshot_id = %self.snapshot_id,
                    detail = err.detail(),
                    "progress polling stopped: {err}"
                );
                let message = match err {
                    ClientError::Rejected { message } => message,
                    _ => POLLING_NETWORK_ERROR_MESSAGE.to_string(),
                };
                PollerReport::Interrupted {
                    token,
                    snapshot_id,
                    message,
                }
            }
        };

        let terminal = report.is_terminal();
        if terminal {
            shared.alive = false;
        }
        let _ = self.reports.try_send(report);
        if terminal { Step::Stop } else { Step::Continue }
    }
}
