use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Opaque identifier the backend assigns on the first successful save.
pub type ProfileId = String;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    #[default]
    Disable,
    Require,
    Prefer,
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SslMode::Disable => write!(f, "disable"),
            SslMode::Require => write!(f, "require"),
            SslMode::Prefer => write!(f, "prefer"),
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = ClientError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "require" => Ok(SslMode::Require),
            "prefer" => Ok(SslMode::Prefer),
            other => Err(ClientError::Validation(format!(
                "Unknown SSL mode '{other}' (expected disable, require or prefer)"
            ))),
        }
    }
}

/// Database password. Serialized as a plain string for the backend, but
/// never printed through `Debug` or `Display`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl From<&str> for Password {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Password {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ProfileId>,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(default)]
    pub password: Password,
    #[serde(default)]
    pub ssl_mode: SslMode,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            database: String::new(),
            username: String::new(),
            password: Password::default(),
            ssl_mode: SslMode::Disable,
        }
    }
}

impl ConnectionProfile {
    pub fn new(
        name: String,
        host: String,
        port: u16,
        database: String,
        username: String,
        password: Password,
        ssl_mode: SslMode,
    ) -> Self {
        Self {
            id: None,
            name,
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
        }
    }

    /// Checks the fields a connection test needs before anything goes over
    /// the wire.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.host.trim().is_empty() {
            return Err(ClientError::Validation("Host is required".into()));
        }
        if self.port == 0 {
            return Err(ClientError::Validation(
                "Port must be a positive integer".into(),
            ));
        }
        if self.database.trim().is_empty() {
            return Err(ClientError::Validation("Database name is required".into()));
        }
        if self.username.trim().is_empty() {
            return Err(ClientError::Validation("Username is required".into()));
        }
        Ok(())
    }

    /// Human readable label, falling back to `host:port/database` when the
    /// profile has no display name.
    pub fn label(&self) -> String {
        if self.name.trim().is_empty() {
            format!("{}:{}/{}", self.host, self.port, self.database)
        } else {
            format!("{} ({}:{})", self.name, self.host, self.port)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub tables: u64,
    #[serde(default)]
    pub schemas: Vec<String>,
}

/// Result of the last connection attempt for the current draft profile.
///
/// `Idle` until a test runs, and again after every edit of the draft.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Success { info: Option<DatabaseInfo> },
    Error { message: String },
}

impl ConnectionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ConnectionStatus::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn database_info(&self) -> Option<&DatabaseInfo> {
        match self {
            ConnectionStatus::Success { info } => info.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionProfile {
        ConnectionProfile::new(
            "local".into(),
            "localhost".into(),
            5432,
            "app".into(),
            "u".into(),
            Password::new("hunter2"),
            SslMode::Disable,
        )
    }

    #[test]
    fn default_profile_targets_local_postgres() {
        let profile = ConnectionProfile::default();
        assert_eq!(profile.host, "localhost");
        assert_eq!(profile.port, 5432);
        assert_eq!(profile.ssl_mode, SslMode::Disable);
        assert!(profile.id.is_none());
        assert!(profile.database.is_empty());
        assert!(profile.password.is_empty());
    }

    #[test]
    fn debug_output_hides_password() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn serializes_backend_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["password"], "hunter2");
        assert_eq!(value["ssl_mode"], "disable");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn decodes_saved_profile_and_ignores_timestamps() {
        let json = r#"{
            "id": "db-1",
            "name": "",
            "host": "localhost",
            "port": 5432,
            "database": "app",
            "username": "u",
            "password": "p",
            "ssl_mode": "require",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }"#;
        let profile: ConnectionProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id.as_deref(), Some("db-1"));
        assert_eq!(profile.ssl_mode, SslMode::Require);
    }

    #[test]
    fn validation_requires_host_database_and_user() {
        assert!(sample().validate().is_ok());

        let mut missing_host = sample();
        missing_host.host = "  ".into();
        assert!(matches!(
            missing_host.validate(),
            Err(ClientError::Validation(_))
        ));

        let mut zero_port = sample();
        zero_port.port = 0;
        assert!(zero_port.validate().is_err());

        let mut missing_user = sample();
        missing_user.username.clear();
        assert!(missing_user.validate().is_err());
    }

    #[test]
    fn ssl_mode_parses_case_insensitively() {
        assert_eq!("Require".parse::<SslMode>().unwrap(), SslMode::Require);
        assert!("verify-full".parse::<SslMode>().is_err());
    }
}
