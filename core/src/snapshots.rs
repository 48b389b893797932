use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::profiles::{ConnectionProfile, ProfileId};

pub type SnapshotId = String;

/// Status vocabulary shared by snapshots, restore operations and progress
/// reports. Values the backend adds later decode to `Unknown`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    Pending,
    Creating,
    InProgress,
    Restoring,
    Completed,
    Failed,
    NotFound,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Creating => "creating",
            OperationStatus::InProgress => "in_progress",
            OperationStatus::Restoring => "restoring",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
            OperationStatus::NotFound => "not_found",
            OperationStatus::Unknown => "unknown",
        }
    }

    /// `completed` and `failed` end an operation; nothing else does.
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }

    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            OperationStatus::Pending
                | OperationStatus::Creating
                | OperationStatus::InProgress
                | OperationStatus::Restoring
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    #[serde(default)]
    pub database_id: ProfileId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn is_restorable(&self) -> bool {
        self.status == OperationStatus::Completed
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOperation {
    pub id: String,
    pub snapshot_id: SnapshotId,
    #[serde(default)]
    pub database_id: ProfileId,
    #[serde(default)]
    pub target_db_name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub database_id: ProfileId,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub database_config: ConnectionProfile,
    pub snapshot_request: SnapshotRequest,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub snapshot_id: SnapshotId,
    pub database_id: ProfileId,
    /// Empty asks the backend to pick a name.
    pub target_db_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSnapshotRequest {
    pub database_config: ConnectionProfile,
    pub restore_request: RestoreRequest,
}

/// Body of the progress endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProgress {
    pub snapshot_id: SnapshotId,
    pub status: OperationStatus,
    /// Percentage as the backend computed it; may fall outside 0..=100.
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgressPhase {
    /// No response from the backend yet.
    #[default]
    Starting,
    Reported(OperationStatus),
}

/// What an observer of a running poller can see.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub phase: ProgressPhase,
    pub percent: Option<u8>,
    pub message: String,
    pub file_size: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
}

impl ProgressState {
    pub fn starting() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Option<OperationStatus> {
        match self.phase {
            ProgressPhase::Starting => None,
            ProgressPhase::Reported(status) => Some(status),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(OperationStatus::is_terminal)
    }

    pub fn label(&self) -> &'static str {
        match self.phase {
            ProgressPhase::Starting => "Starting...",
            ProgressPhase::Reported(OperationStatus::InProgress) => "Creating Backup...",
            ProgressPhase::Reported(OperationStatus::Completed) => "Backup Complete!",
            ProgressPhase::Reported(OperationStatus::Failed) => "Backup Failed",
            ProgressPhase::Reported(_) => "Processing...",
        }
    }
}

impl From<&SnapshotProgress> for ProgressState {
    fn from(report: &SnapshotProgress) -> Self {
        Self {
            phase: ProgressPhase::Reported(report.status),
            percent: Some(report.progress.clamp(0, 100) as u8),
            message: report.message.clone(),
            file_size: report.file_size,
            started_at: report.started_at,
        }
    }
}

/// Renders a byte count with binary units, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".into();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
