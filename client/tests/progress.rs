mod common;

use std::time::Duration;

use common::{MockBackend, progress};
use pgtm_client::{
    OPERATION_FAILED_MESSAGE, POLLING_NETWORK_ERROR_MESSAGE, PollerReport, ProgressPoller,
};
use pgtm_core::{
    ClientError,
    snapshots::{OperationStatus, ProgressPhase},
};

const INTERVAL: Duration = Duration::from_secs(2);

#[tokio::test(start_paused = true)]
async fn stops_after_the_first_terminal_report() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 10, "Creating backup...")))
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 55, "Creating backup...")))
        .push(Ok(progress("snap-1", OperationStatus::Completed, 100, "Backup completed")));
    let (tx, rx) = async_channel::unbounded();

    let poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);

    let mut reports = Vec::new();
    while let Ok(report) = rx.recv().await {
        let terminal = report.is_terminal();
        reports.push(report);
        if terminal {
            break;
        }
    }
    tokio::time::sleep(INTERVAL * 5).await;

    assert_eq!(reports.len(), 3);
    assert!(matches!(
        &reports[0],
        PollerReport::Progress { state, .. } if state.percent == Some(10)
    ));
    assert!(matches!(
        &reports[1],
        PollerReport::Progress { state, .. } if state.percent == Some(55)
    ));
    assert!(matches!(&reports[2], PollerReport::Completed { snapshot_id, .. } if snapshot_id == "snap-1"));
    assert!(reports.iter().all(|report| report.token() == poller.token()));
    assert_eq!(backend.progress_queries(), 3);
    assert!(rx.is_empty());
    assert!(!poller.is_active());
    assert_eq!(
        poller.state().phase,
        ProgressPhase::Reported(OperationStatus::Completed)
    );
}

#[tokio::test(start_paused = true)]
async fn waits_one_interval_between_queries() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 10, "")));
    let (tx, rx) = async_channel::unbounded();

    let _poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);

    rx.recv().await.unwrap();
    assert_eq!(backend.progress_queries(), 1);
    tokio::time::sleep(INTERVAL / 2).await;
    assert_eq!(backend.progress_queries(), 1);
    rx.recv().await.unwrap();
    assert_eq!(backend.progress_queries(), 2);
}

#[tokio::test(start_paused = true)]
async fn starts_without_a_reported_status() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 10, "")));
    let (tx, _rx) = async_channel::unbounded();

    let poller = ProgressPoller::spawn(backend, "snap-1", INTERVAL, tx);

    let state = poller.state();
    assert_eq!(state.phase, ProgressPhase::Starting);
    assert_eq!(state.percent, None);
    assert_eq!(state.label(), "Starting...");
    assert!(poller.is_active());
}

#[tokio::test(start_paused = true)]
async fn dispose_between_queries_stops_polling() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 10, "")));
    let (tx, rx) = async_channel::unbounded();

    let mut poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);
    rx.recv().await.unwrap();
    poller.dispose();
    tokio::time::sleep(INTERVAL * 10).await;

    assert_eq!(backend.progress_queries(), 1);
    assert!(rx.is_empty());
    assert!(!poller.is_active());
}

#[tokio::test(start_paused = true)]
async fn dispose_during_a_query_suppresses_its_answer() {
    let backend = MockBackend::new();
    *backend.progress_delay.lock() = Duration::from_secs(5);
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::Completed, 100, "done")));
    let (tx, rx) = async_channel::unbounded();

    let mut poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.progress_queries(), 1);

    poller.dispose();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(backend.progress_queries(), 1);
    assert!(rx.is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_poller_disposes_it() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::InProgress, 10, "")));
    let (tx, rx) = async_channel::unbounded();

    let poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);
    rx.recv().await.unwrap();
    drop(poller);
    tokio::time::sleep(INTERVAL * 10).await;

    assert_eq!(backend.progress_queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_without_message_uses_default() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::Failed, 0, "")));
    let (tx, rx) = async_channel::unbounded();

    let _poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);
    let report = rx.recv().await.unwrap();

    assert!(matches!(
        report,
        PollerReport::Failed { ref message, .. } if message == OPERATION_FAILED_MESSAGE
    ));
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(backend.progress_queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn failure_carries_backend_message() {
    let backend = MockBackend::new();
    backend.progress.push(Ok(progress(
        "snap-1",
        OperationStatus::Failed,
        0,
        "pg_dump: error: connection refused",
    )));
    let (tx, rx) = async_channel::unbounded();

    let _poller = ProgressPoller::spawn(backend, "snap-1", INTERVAL, tx);

    assert!(matches!(
        rx.recv().await.unwrap(),
        PollerReport::Failed { message, .. } if message == "pg_dump: error: connection refused"
    ));
}

#[tokio::test(start_paused = true)]
async fn transport_failure_interrupts_with_network_message() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Err(ClientError::network("connection reset by peer")));
    let (tx, rx) = async_channel::unbounded();

    let poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);
    let report = rx.recv().await.unwrap();

    assert!(matches!(
        report,
        PollerReport::Interrupted { ref message, .. } if message == POLLING_NETWORK_ERROR_MESSAGE
    ));
    tokio::time::sleep(INTERVAL * 3).await;
    assert_eq!(backend.progress_queries(), 1);
    assert!(!poller.is_active());
}

#[tokio::test(start_paused = true)]
async fn rejection_interrupts_with_backend_message() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Err(ClientError::rejected("Failed to get progress")));
    let (tx, rx) = async_channel::unbounded();

    let _poller = ProgressPoller::spawn(backend, "snap-1", INTERVAL, tx);

    assert!(matches!(
        rx.recv().await.unwrap(),
        PollerReport::Interrupted { message, .. } if message == "Failed to get progress"
    ));
}

#[tokio::test(start_paused = true)]
async fn not_found_keeps_polling() {
    let backend = MockBackend::new();
    backend
        .progress
        .push(Ok(progress("snap-1", OperationStatus::NotFound, 0, "")))
        .push(Ok(progress("snap-1", OperationStatus::Completed, 100, "")));
    let (tx, rx) = async_channel::unbounded();

    let _poller = ProgressPoller::spawn(backend.clone(), "snap-1", INTERVAL, tx);

    let first = rx.recv().await.unwrap();
    assert!(matches!(
        first,
        PollerReport::Progress { ref state, .. }
            if state.phase == ProgressPhase::Reported(OperationStatus::NotFound)
    ));
    assert!(matches!(rx.recv().await.unwrap(), PollerReport::Completed { .. }));
    assert_eq!(backend.progress_queries(), 2);
}
