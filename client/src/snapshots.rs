use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use async_channel::{Receiver, Sender};
use pgtm_core::{
    ClientError,
    profiles::{ConnectionProfile, ProfileId},
    snapshots::{
        CreateSnapshotRequest, OperationStatus, ProgressState, RestoreOperation, RestoreRequest,
        RestoreSnapshotRequest, Snapshot, SnapshotId, SnapshotRequest,
    },
};

use crate::{BackendClient, ClientResult, ConnectedProfile, PollerReport, ProgressPoller};

/// What the owner of a [`SnapshotController`] learns from its pollers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SnapshotEvent {
    Progress {
        snapshot_id: SnapshotId,
        state: ProgressState,
    },
    Completed {
        snapshot_id: SnapshotId,
    },
    Failed {
        snapshot_id: SnapshotId,
        message: String,
    },
}

/// Snapshot and restore bookkeeping for one saved database connection.
pub struct SnapshotController<B: ?Sized> {
    backend: Arc<B>,
    database: ConnectionProfile,
    database_id: ProfileId,
    snapshots: Vec<Snapshot>,
    restores: Vec<RestoreOperation>,
    pollers: HashMap<SnapshotId, ProgressPoller>,
    /// Finished while tracked, but not yet confirmed by a fetched list.
    settled: HashSet<SnapshotId>,
    poll_interval: Duration,
    reports_tx: Sender<PollerReport>,
    reports_rx: Receiver<PollerReport>,
}

impl<B> SnapshotController<B>
where
    B: BackendClient + ?Sized + 'static,
{
    /// Binds a controller to a profile the backend has saved. Profiles
    /// without an id are rejected.
    pub fn new(
        backend: Arc<B>,
        database: ConnectionProfile,
        poll_interval: Duration,
    ) -> ClientResult<Self> {
        let Some(database_id) = database.id.clone() else {
            return Err(ClientError::Precondition(
                "Connection has not been saved by the backend; snapshots are unavailable".into(),
            ));
        };
        let (reports_tx, reports_rx) = async_channel::unbounded();
        Ok(Self {
            backend,
            database,
            database_id,
            snapshots: Vec::new(),
            restores: Vec::new(),
            pollers: HashMap::new(),
            settled: HashSet::new(),
            poll_interval,
            reports_tx,
            reports_rx,
        })
    }

    pub fn from_connected(
        backend: Arc<B>,
        connected: &ConnectedProfile,
        poll_interval: Duration,
    ) -> ClientResult<Self> {
        if !connected.is_connected() {
            return Err(ClientError::Precondition(
                "Connection is not established; save it before managing snapshots".into(),
            ));
        }
        Self::new(backend, connected.profile.clone(), poll_interval)
    }

    pub fn database(&self) -> &ConnectionProfile {
        &self.database
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn restores(&self) -> &[RestoreOperation] {
        &self.restores
    }

    pub fn find(&self, snapshot_id: &str) -> Option<&Snapshot> {
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.id == snapshot_id)
    }

    pub fn is_tracking(&self, snapshot_id: &str) -> bool {
        self.pollers.contains_key(snapshot_id)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.pollers.keys().map(String::as_str)
    }

    /// Latest progress for a snapshot, while it is being tracked.
    pub fn progress(&self, snapshot_id: &str) -> Option<ProgressState> {
        self.pollers.get(snapshot_id).map(ProgressPoller::state)
    }

    /// Replaces the local list with the backend's, in server order. On
    /// failure the previous list is left untouched.
    pub async fn list_snapshots(&mut self) -> ClientResult<&[Snapshot]> {
        let fetched = match self.backend.list_snapshots(&self.database_id).await {
            Ok(fetched) => fetched,
            Err(err) => {
                tracing::warn!(
                    database_id = %self.database_id,
                    detail = err.detail(),
                    "failed to load snapshots: {err}"
                );
                return Err(err);
            }
        };
        self.replace_list(fetched);
        Ok(&self.snapshots)
    }

    /// Fetches a single snapshot and folds it into the local list.
    pub async fn snapshot(&mut self, snapshot_id: &str) -> ClientResult<Snapshot> {
        let snapshot = self.backend.get_snapshot(snapshot_id).await?;
        self.upsert(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn create_snapshot(
        &mut self,
        name: &str,
        description: &str,
    ) -> ClientResult<Snapshot> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("Snapshot name is required".into()));
        }

        let request = CreateSnapshotRequest {
            database_config: self.database.clone(),
            snapshot_request: SnapshotRequest {
                database_id: self.database_id.clone(),
                name: name.to_string(),
                description: description.to_string(),
            },
        };
        let accepted = self.backend.create_snapshot(&request).await?;
        tracing::info!(
            snapshot_id = %accepted.id,
            status = %accepted.status,
            "snapshot creation started"
        );

        self.upsert(accepted.clone());
        self.track(&accepted.id);
        if let Err(err) = self.list_snapshots().await {
            tracing::warn!("snapshot list refresh after create failed: {err}");
        }
        Ok(accepted)
    }

    /// Deletes a snapshot. Asking the user for confirmation is the caller's
    /// job.
    pub async fn delete_snapshot(&mut self, snapshot_id: &str) -> ClientResult<()> {
        if let Some(snapshot) = self.find(snapshot_id) {
            if snapshot.status.is_in_flight() {
                return Err(ClientError::Precondition(format!(
                    "Snapshot '{}' is still {}; wait for it to finish before deleting it",
                    snapshot.name, snapshot.status
                )));
            }
        }

        self.backend.delete_snapshot(snapshot_id).await?;
        tracing::info!(snapshot_id, "snapshot deleted");

        if let Some(mut poller) = self.pollers.remove(snapshot_id) {
            poller.dispose();
        }
        self.settled.remove(snapshot_id);
        self.snapshots.retain(|snapshot| snapshot.id != snapshot_id);
        if let Err(err) = self.list_snapshots().await {
            tracing::warn!("snapshot list refresh after delete failed: {err}");
        }
        Ok(())
    }

    /// Starts restoring a completed snapshot. An empty `target_db_name` lets
    /// the backend choose the database name.
    pub async fn restore_snapshot(
        &mut self,
        snapshot_id: &str,
        target_db_name: &str,
    ) -> ClientResult<RestoreOperation> {
        let Some(snapshot) = self.find(snapshot_id) else {
            return Err(ClientError::Precondition(format!(
                "Snapshot {snapshot_id} is not loaded; refresh the list before restoring"
            )));
        };
        if !snapshot.is_restorable() {
            return Err(ClientError::Precondition(format!(
                "Snapshot '{}' is {}; only completed snapshots can be restored",
                snapshot.name, snapshot.status
            )));
        }

        let request = RestoreSnapshotRequest {
            database_config: self.database.clone(),
            restore_request: RestoreRequest {
                snapshot_id: snapshot_id.to_string(),
                database_id: self.database_id.clone(),
                target_db_name: target_db_name.trim().to_string(),
            },
        };
        let operation = self.backend.restore_snapshot(&request).await?;
        tracing::info!(
            restore_id = %operation.id,
            snapshot_id,
            target = %operation.target_db_name,
            "restore started"
        );
        self.restores.push(operation.clone());
        Ok(operation)
    }

    /// Waits for the next poller report and applies it to local state.
    /// Returns `None` once nothing is tracked and no report is pending.
    pub async fn next_event(&mut self) -> Option<SnapshotEvent> {
        loop {
            if self.pollers.is_empty() && self.reports_rx.is_empty() {
                return None;
            }
            let report = self.reports_rx.recv().await.ok()?;
            if let Some(event) = self.apply(report).await {
                return Some(event);
            }
        }
    }

    /// Stops every poller. Reports already queued are dropped.
    pub fn dispose(&mut self) {
        for (_, mut poller) in self.pollers.drain() {
            poller.dispose();
        }
        while self.reports_rx.try_recv().is_ok() {}
    }

    fn track(&mut self, snapshot_id: &str) {
        if self
            .pollers
            .get(snapshot_id)
            .is_some_and(ProgressPoller::is_active)
        {
            return;
        }
        let poller = ProgressPoller::spawn(
            self.backend.clone(),
            snapshot_id,
            self.poll_interval,
            self.reports_tx.clone(),
        );
        self.pollers.insert(snapshot_id.to_string(), poller);
    }

    async fn apply(&mut self, report: PollerReport) -> Option<SnapshotEvent> {
        let current = self
            .pollers
            .get(report.snapshot_id())
            .map(ProgressPoller::token);
        if current != Some(report.token()) {
            tracing::debug!(
                snapshot_id = report.snapshot_id(),
                "dropping report from a disposed poller"
            );
            return None;
        }

        let snapshot_id = report.snapshot_id().to_string();
        let event = match report {
            PollerReport::Progress { state, .. } => {
                if let Some(snapshot) = self.find_mut(&snapshot_id) {
                    if let Some(status) = state.status().filter(|status| status.is_in_flight()) {
                        snapshot.status = status;
                    }
                    if let Some(size) = state.file_size {
                        snapshot.file_size = size;
                    }
                }
                return Some(SnapshotEvent::Progress { snapshot_id, state });
            }
            PollerReport::Completed { .. } => {
                if let Some(snapshot) = self.find_mut(&snapshot_id) {
                    snapshot.status = OperationStatus::Completed;
                }
                tracing::info!(snapshot_id = %snapshot_id, "snapshot completed");
                SnapshotEvent::Completed {
                    snapshot_id: snapshot_id.clone(),
                }
            }
            PollerReport::Failed { message, .. } => {
                if let Some(snapshot) = self.find_mut(&snapshot_id) {
                    snapshot.status = OperationStatus::Failed;
                    snapshot.error_message = message.clone();
                }
                tracing::warn!(snapshot_id = %snapshot_id, "snapshot failed: {message}");
                SnapshotEvent::Failed {
                    snapshot_id: snapshot_id.clone(),
                    message,
                }
            }
            PollerReport::Interrupted { message, .. } => SnapshotEvent::Failed {
                snapshot_id: snapshot_id.clone(),
                message,
            },
        };

        // Terminal: keep the local outcome until a fetched list carries it.
        self.pollers.remove(&snapshot_id);
        self.settled.insert(snapshot_id);
        if let Err(err) = self.list_snapshots().await {
            tracing::warn!("snapshot list refresh after tracking ended failed: {err}");
        }
        Some(event)
    }

    /// Snapshots still tracked, or settled but not yet listed, survive a
    /// refresh that does not list them, so an accepted creation and its
    /// outcome never vanish from view. They stay in front, newest first.
    fn replace_list(&mut self, fetched: Vec<Snapshot>) {
        self.settled
            .retain(|id| !fetched.iter().any(|snapshot| &snapshot.id == id));
        let mut pending: Vec<Snapshot> = self
            .snapshots
            .drain(..)
            .filter(|snapshot| {
                (self.pollers.contains_key(&snapshot.id) || self.settled.contains(&snapshot.id))
                    && !fetched.iter().any(|other| other.id == snapshot.id)
            })
            .collect();
        pending.extend(fetched);
        self.snapshots = pending;
    }

    fn upsert(&mut self, snapshot: Snapshot) {
        match self.find_mut(&snapshot.id) {
            Some(existing) => *existing = snapshot,
            None => self.snapshots.insert(0, snapshot),
        }
    }

    fn find_mut(&mut self, snapshot_id: &str) -> Option<&mut Snapshot> {
        self.snapshots
            .iter_mut()
            .find(|snapshot| snapshot.id == snapshot_id)
    }
}
