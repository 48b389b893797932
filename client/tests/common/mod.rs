#![allow(dead_code)]

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use pgtm_client::{BackendClient, ClientResult};
use pgtm_core::{
    ClientError,
    profiles::{ConnectionProfile, DatabaseInfo, Password, SslMode},
    snapshots::{
        CreateSnapshotRequest, OperationStatus, RestoreOperation, RestoreSnapshotRequest,
        Snapshot, SnapshotProgress,
    },
    system::{SystemHealth, SystemInfo},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Test,
    Info,
    Save,
    List(String),
    Get(String),
    Create(CreateSnapshotRequest),
    Delete(String),
    Restore(RestoreSnapshotRequest),
    Progress(String),
    Health,
    SystemInfo,
}

/// Scripted answers for one endpoint. Answers are consumed in order and
/// the last one repeats.
pub struct Script<T> {
    answers: Mutex<VecDeque<ClientResult<T>>>,
}

impl<T: Clone> Script<T> {
    fn new() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, answer: ClientResult<T>) -> &Self {
        self.answers.lock().push_back(answer);
        self
    }

    /// Drops whatever is still queued and answers with `answer` from now on.
    pub fn replace(&self, answer: ClientResult<T>) -> &Self {
        let mut answers = self.answers.lock();
        answers.clear();
        answers.push_back(answer);
        drop(answers);
        self
    }

    fn next(&self, endpoint: &str) -> ClientResult<T> {
        let mut answers = self.answers.lock();
        if answers.len() > 1 {
            if let Some(answer) = answers.pop_front() {
                return answer;
            }
        }
        answers
            .front()
            .cloned()
            .unwrap_or_else(|| Err(ClientError::network(format!("nothing scripted for {endpoint}"))))
    }
}

pub struct MockBackend {
    calls: Mutex<Vec<Call>>,
    pub progress_delay: Mutex<Duration>,
    pub test: Script<()>,
    pub info: Script<DatabaseInfo>,
    pub save: Script<ConnectionProfile>,
    pub list: Script<Vec<Snapshot>>,
    pub get: Script<Snapshot>,
    pub create: Script<Snapshot>,
    pub delete: Script<()>,
    pub restore: Script<RestoreOperation>,
    pub progress: Script<SnapshotProgress>,
    pub health: Script<SystemHealth>,
    pub system_info: Script<SystemInfo>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            progress_delay: Mutex::new(Duration::ZERO),
            test: Script::new(),
            info: Script::new(),
            save: Script::new(),
            list: Script::new(),
            get: Script::new(),
            create: Script::new(),
            delete: Script::new(),
            restore: Script::new(),
            progress: Script::new(),
            health: Script::new(),
            system_info: Script::new(),
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn progress_queries(&self) -> usize {
        self.count(|call| matches!(call, Call::Progress(_)))
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn test_connection(&self, _profile: &ConnectionProfile) -> ClientResult<()> {
        self.record(Call::Test);
        self.test.next("test")
    }

    async fn database_info(&self, _profile: &ConnectionProfile) -> ClientResult<DatabaseInfo> {
        self.record(Call::Info);
        self.info.next("info")
    }

    async fn save_connection(
        &self,
        _profile: &ConnectionProfile,
    ) -> ClientResult<ConnectionProfile> {
        self.record(Call::Save);
        self.save.next("save")
    }

    async fn list_snapshots(&self, database_id: &str) -> ClientResult<Vec<Snapshot>> {
        self.record(Call::List(database_id.to_string()));
        self.list.next("list")
    }

    async fn get_snapshot(&self, snapshot_id: &str) -> ClientResult<Snapshot> {
        self.record(Call::Get(snapshot_id.to_string()));
        self.get.next("get")
    }

    async fn create_snapshot(&self, request: &CreateSnapshotRequest) -> ClientResult<Snapshot> {
        self.record(Call::Create(request.clone()));
        self.create.next("create")
    }

    async fn delete_snapshot(&self, snapshot_id: &str) -> ClientResult<()> {
        self.record(Call::Delete(snapshot_id.to_string()));
        self.delete.next("delete")
    }

    async fn restore_snapshot(
        &self,
        request: &RestoreSnapshotRequest,
    ) -> ClientResult<RestoreOperation> {
        self.record(Call::Restore(request.clone()));
        self.restore.next("restore")
    }

    async fn snapshot_progress(&self, snapshot_id: &str) -> ClientResult<SnapshotProgress> {
        self.record(Call::Progress(snapshot_id.to_string()));
        let delay = *self.progress_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.progress.next("progress")
    }

    async fn system_health(&self) -> ClientResult<SystemHealth> {
        self.record(Call::Health);
        self.health.next("health")
    }

    async fn system_info(&self) -> ClientResult<SystemInfo> {
        self.record(Call::SystemInfo);
        self.system_info.next("system info")
    }
}

pub fn draft_profile() -> ConnectionProfile {
    ConnectionProfile::new(
        String::new(),
        "localhost".into(),
        5432,
        "app".into(),
        "u".into(),
        Password::new("p"),
        SslMode::Disable,
    )
}

pub fn saved_profile(id: &str) -> ConnectionProfile {
    ConnectionProfile {
        id: Some(id.to_string()),
        ..draft_profile()
    }
}

pub fn database_info() -> DatabaseInfo {
    DatabaseInfo {
        name: "app".into(),
        size: "12MB".into(),
        tables: 8,
        schemas: vec!["public".into()],
    }
}

pub fn snapshot(id: &str, status: OperationStatus) -> Snapshot {
    Snapshot {
        id: id.to_string(),
        database_id: "db-1".into(),
        name: format!("snapshot {id}"),
        description: String::new(),
        file_path: format!("/var/lib/snapshots/{id}.sql"),
        file_size: 0,
        status,
        error_message: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        completed_at: None,
    }
}

pub fn restore_operation(id: &str, snapshot_id: &str, target: &str) -> RestoreOperation {
    RestoreOperation {
        id: id.to_string(),
        snapshot_id: snapshot_id.to_string(),
        database_id: "db-1".into(),
        target_db_name: target.to_string(),
        status: OperationStatus::Pending,
        error_message: String::new(),
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap(),
        completed_at: None,
    }
}

pub fn progress(id: &str, status: OperationStatus, percent: u8, message: &str) -> SnapshotProgress {
    SnapshotProgress {
        snapshot_id: id.to_string(),
        status,
        progress: i32::from(percent),
        message: message.to_string(),
        file_size: None,
        started_at: None,
    }
}
