use clap::{Args, Parser, Subcommand, ValueEnum};
use pgtm_core::profiles::{DEFAULT_HOST, DEFAULT_PORT, SslMode};

#[derive(Parser, Debug)]
#[command(name = "pgtm")]
#[command(author, version, about = "PostgreSQL snapshot and restore client")]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Base URL of the snapshot service
    #[arg(long, global = true, env = "PGTM_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Delay between progress queries, in milliseconds
    #[arg(long, global = true, env = "PGTM_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Where the last connection is remembered
    #[arg(long, global = true, env = "PGTM_STORE", value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    File,
    Keyring,
    Memory,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the snapshot service's health
    Health,
    /// Test a connection, save it on the service and remember it
    Connect(ConnectArgs),
    /// Test the remembered connection again
    Reconnect,
    /// Forget the remembered connection
    Forget,
    /// Manage snapshots of the remembered connection
    #[command(subcommand)]
    Snapshots(SnapshotCommand),
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Database to connect to
    pub database: String,

    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    #[arg(short, long)]
    pub username: String,

    #[arg(long, env = "PGTM_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// disable, require or prefer
    #[arg(long, default_value = "disable")]
    pub ssl_mode: SslMode,

    /// Display name, defaults to the database name
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List snapshots, newest first
    List,
    /// Show one snapshot
    Show { snapshot_id: String },
    /// Start a new snapshot
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Follow progress until the snapshot completes or fails
        #[arg(short, long)]
        wait: bool,
    },
    /// Delete a snapshot
    Delete {
        snapshot_id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Restore a completed snapshot
    Restore {
        snapshot_id: String,

        /// Name of the database to restore into; the service picks one when omitted
        #[arg(short, long, default_value = "")]
        target: String,
    },
}
