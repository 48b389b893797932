use std::sync::Arc;

use anyhow::{Context as _, bail};
use pgtm_client::{
    ClientConfig, ConnectedProfile, ConnectionOrchestrator, HttpBackend, SnapshotController,
    SnapshotEvent, SystemStatus,
};
use pgtm_core::{
    profiles::{ConnectionProfile, Password},
    snapshots::{Snapshot, format_file_size},
};
use pgtm_storage::PersistenceStore;

use crate::{
    Result,
    cli::{Command, ConnectArgs, SnapshotCommand},
};

type Orchestrator = ConnectionOrchestrator<HttpBackend, Box<dyn PersistenceStore>>;

pub async fn dispatch(
    command: Command,
    backend: Arc<HttpBackend>,
    store: Box<dyn PersistenceStore>,
    secrets: Option<Box<dyn PersistenceStore>>,
    config: &ClientConfig,
) -> Result<()> {
    let mut orchestrator = ConnectionOrchestrator::new(backend.clone(), store);
    if let Some(secrets) = secrets {
        orchestrator = orchestrator.with_secrets(secrets);
    }
    match command {
        Command::Health => health(backend).await,
        Command::Connect(args) => connect(&mut orchestrator, args).await,
        Command::Reconnect => {
            let Some(outcome) = orchestrator.reconnect().await else {
                bail!("No saved connection; run `pgtm connect` first");
            };
            print_connected(&outcome?);
            Ok(())
        }
        Command::Forget => {
            orchestrator.clear_persisted();
            println!("Saved connection removed");
            Ok(())
        }
        Command::Snapshots(command) => {
            let profile = orchestrator
                .load_persisted_profile()
                .context("No saved connection; run `pgtm connect` first")?;
            let mut controller = SnapshotController::new(backend, profile, config.poll_interval)?;
            let outcome = snapshots(&mut controller, command).await;
            controller.dispose();
            outcome
        }
    }
}

async fn health(backend: Arc<HttpBackend>) -> Result<()> {
    let report = SystemStatus::new(backend).report().await?;
    println!("{}", report.summary());
    if let Some(error) = report.health.tools_error() {
        println!("  tools error: {error}");
    }
    if let Some(info) = &report.info {
        println!("  {} {}", info.application.name, info.application.version);
        if let Some(versions) = &info.postgresql_tools.versions {
            println!("  pg_dump: {}", versions.pg_dump);
            println!("  psql:    {}", versions.psql);
        }
    }
    Ok(())
}

async fn connect(orchestrator: &mut Orchestrator, args: ConnectArgs) -> Result<()> {
    let profile = ConnectionProfile::new(
        args.name.unwrap_or_else(|| args.database.clone()),
        args.host,
        args.port,
        args.database,
        args.username,
        Password::new(args.password),
        args.ssl_mode,
    );
    let connected = orchestrator.test_connection(profile).await?;
    print_connected(&connected);
    Ok(())
}

fn print_connected(connected: &ConnectedProfile) {
    println!("Connection successful: {}", connected.profile.label());
    match (&connected.info, &connected.info_error) {
        (Some(info), _) => {
            println!("  database: {}", info.name);
            println!("  size:     {}", info.size);
            println!("  tables:   {}", info.tables);
            println!("  schemas:  {}", info.schemas.join(", "));
        }
        (None, Some(err)) => println!("  database info unavailable: {}", err.user_message()),
        (None, None) => {}
    }
    match (connected.database_id(), &connected.save_error) {
        (Some(id), _) => {
            println!("  saved as {id}");
            if !connected.persisted {
                println!("  not remembered locally; run `pgtm connect` again to retry");
            }
        }
        (None, Some(err)) => println!("  not saved, snapshots unavailable: {}", err.user_message()),
        (None, None) => {}
    }
}

async fn snapshots(
    controller: &mut SnapshotController<HttpBackend>,
    command: SnapshotCommand,
) -> Result<()> {
    match command {
        SnapshotCommand::List => {
            let snapshots = controller.list_snapshots().await?;
            if snapshots.is_empty() {
                println!("No snapshots for {}", controller.database().label());
                return Ok(());
            }
            for snapshot in controller.snapshots() {
                print_row(snapshot);
            }
        }
        SnapshotCommand::Show { snapshot_id } => {
            let snapshot = controller.snapshot(&snapshot_id).await?;
            print_details(&snapshot);
        }
        SnapshotCommand::Create {
            name,
            description,
            wait,
        } => {
            let snapshot = controller.create_snapshot(&name, &description).await?;
            println!("Snapshot {} started ({})", snapshot.id, snapshot.status);
            if wait {
                follow(controller).await?;
            }
        }
        SnapshotCommand::Delete { snapshot_id, yes } => {
            if !yes {
                bail!("Deleting {snapshot_id} cannot be undone; pass --yes to confirm");
            }
            controller.list_snapshots().await?;
            controller.delete_snapshot(&snapshot_id).await?;
            println!("Snapshot {snapshot_id} deleted");
        }
        SnapshotCommand::Restore {
            snapshot_id,
            target,
        } => {
            controller.list_snapshots().await?;
            let operation = controller.restore_snapshot(&snapshot_id, &target).await?;
            let target = if operation.target_db_name.is_empty() {
                "a new database"
            } else {
                operation.target_db_name.as_str()
            };
            println!(
                "Restore {} of snapshot {} into {target} started ({})",
                operation.id, operation.snapshot_id, operation.status
            );
        }
    }
    Ok(())
}

async fn follow(controller: &mut SnapshotController<HttpBackend>) -> Result<()> {
    while let Some(event) = controller.next_event().await {
        match event {
            SnapshotEvent::Progress { state, .. } => {
                let percent = state.percent.unwrap_or_default();
                match state.file_size {
                    Some(size) => println!(
                        "{:>3}% {} {}",
                        percent,
                        state.label(),
                        format_file_size(size)
                    ),
                    None => println!("{percent:>3}% {}", state.label()),
                }
            }
            SnapshotEvent::Completed { snapshot_id } => {
                if let Some(snapshot) = controller.find(&snapshot_id) {
                    print_details(snapshot);
                } else {
                    println!("Snapshot {snapshot_id} completed");
                }
            }
            SnapshotEvent::Failed {
                snapshot_id,
                message,
            } => bail!("Snapshot {snapshot_id} failed: {message}"),
        }
    }
    Ok(())
}

fn print_row(snapshot: &Snapshot) {
    println!(
        "{:<38} {:<24} {:<12} {:>10}  {}",
        snapshot.id,
        snapshot.name,
        snapshot.status.as_str(),
        format_file_size(snapshot.file_size),
        snapshot.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_details(snapshot: &Snapshot) {
    println!("{} ({})", snapshot.name, snapshot.id);
    println!("  status:  {}", snapshot.status);
    println!("  size:    {}", format_file_size(snapshot.file_size));
    println!("  created: {}", snapshot.created_at.to_rfc3339());
    if let Some(completed) = snapshot.completed_at {
        println!("  done:    {}", completed.to_rfc3339());
    }
    if !snapshot.description.is_empty() {
        println!("  note:    {}", snapshot.description);
    }
    if !snapshot.error_message.is_empty() {
        println!("  error:   {}", snapshot.error_message);
    }
}
