pub mod error;
pub mod profiles;
pub mod snapshots;
pub mod system;

pub use error::ClientError;

pub type Result<T> = anyhow::Result<T>;
