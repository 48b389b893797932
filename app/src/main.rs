mod cli;
mod commands;

use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use cli::{Cli, ConfigArgs, StoreKind};
use directories::BaseDirs;
use pgtm_client::{ClientConfig, HttpBackend};
use pgtm_storage::{FileStore, KeyringStore, MemoryStore, PersistenceStore};

type Result<T> = anyhow::Result<T>;

fn main() {
    if let Err(err) = run() {
        eprintln!("pgtm failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = client_config(&cli.config);
    let (store, secrets) = open_store(cli.config.store)?;
    let backend = Arc::new(HttpBackend::new(&config));
    tracing::debug!(base_url = backend.base_url(), "using snapshot service");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(commands::dispatch(cli.command, backend, store, secrets, &config))
}

fn client_config(args: &ConfigArgs) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(url) = &args.backend_url {
        config.base_url = url.clone();
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval = Duration::from_millis(ms.max(1));
    }
    config
}

type Store = Box<dyn PersistenceStore>;

/// Profile store plus, for the file store, the keychain for passwords.
fn open_store(kind: StoreKind) -> Result<(Store, Option<Store>)> {
    let keyring = || -> Store { Box::new(KeyringStore::new()) };
    Ok(match kind {
        StoreKind::File => {
            let store: Store = Box::new(FileStore::new(&resolve_config_dir()?));
            (store, Some(keyring()))
        }
        StoreKind::Keyring => (keyring(), None),
        StoreKind::Memory => {
            let store: Store = Box::new(MemoryStore::new());
            (store, None)
        }
    })
}

fn init_tracing() {
    use std::sync::OnceLock;
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}

fn resolve_config_dir() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().context("Unable to determine config directory")?;
    let dir_name = if cfg!(target_os = "linux") {
        "pgtm"
    } else {
        "PgTimeMachine"
    };
    let dir = base_dirs.config_dir().join(dir_name);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    Ok(dir)
}
