use std::sync::Arc;

use pgtm_core::{
    ClientError,
    profiles::{ConnectionProfile, ConnectionStatus, DatabaseInfo, Password},
};
use pgtm_storage::PersistenceStore;

use crate::{BackendClient, ClientResult};

/// Store key the last successfully connected profile is kept under.
pub const LAST_CONNECTION_KEY: &str = "last_connection";

/// Secret key for a saved profile's password: `password:{id}:{username}`.
fn password_key(profile: &ConnectionProfile) -> Option<String> {
    let id = profile.id.as_deref()?;
    Some(format!("password:{id}:{}", profile.username))
}

/// Outcome of a connection test whose first step succeeded.
///
/// The database-info and save steps are best effort: their failures are
/// carried here instead of failing the whole call.
#[derive(Clone, Debug)]
pub struct ConnectedProfile {
    /// The backend's saved copy (with id) when the save step succeeded,
    /// otherwise the profile as tested.
    pub profile: ConnectionProfile,
    pub info: Option<DatabaseInfo>,
    pub info_error: Option<ClientError>,
    pub save_error: Option<ClientError>,
    /// Whether the profile was written to the local store.
    pub persisted: bool,
}

impl ConnectedProfile {
    /// Snapshot management needs the backend to know the database, so only
    /// a saved profile counts as connected.
    pub fn is_connected(&self) -> bool {
        self.save_error.is_none() && self.profile.id.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.info_error.is_none() && self.is_connected()
    }

    pub fn database_id(&self) -> Option<&str> {
        if self.is_connected() {
            self.profile.id.as_deref()
        } else {
            None
        }
    }
}

/// Drives the connection sequence and remembers the last good profile.
///
/// The profile is written to `store` without its password; the password
/// goes to the secrets store under `password:{id}:{username}`. Without a
/// separate secrets store both live in `store`.
pub struct ConnectionOrchestrator<B: ?Sized, S> {
    backend: Arc<B>,
    store: S,
    secrets: Option<Box<dyn PersistenceStore>>,
    profile: ConnectionProfile,
    status: ConnectionStatus,
    connected: Option<ConnectionProfile>,
}

impl<B, S> ConnectionOrchestrator<B, S>
where
    B: BackendClient + ?Sized,
    S: PersistenceStore,
{
    pub fn new(backend: Arc<B>, store: S) -> Self {
        Self {
            backend,
            store,
            secrets: None,
            profile: ConnectionProfile::default(),
            status: ConnectionStatus::Idle,
            connected: None,
        }
    }

    /// Keeps passwords in `secrets` instead of the profile store.
    pub fn with_secrets(mut self, secrets: impl PersistenceStore + 'static) -> Self {
        self.secrets = Some(Box::new(secrets));
        self
    }

    /// The draft being edited or tested.
    pub fn profile(&self) -> &ConnectionProfile {
        &self.profile
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// The backend-saved profile from the last successful sequence.
    pub fn connected(&self) -> Option<&ConnectionProfile> {
        self.connected.as_ref()
    }

    /// Applies a user edit to the draft. Any earlier test result no longer
    /// describes the draft, so the status goes back to idle.
    pub fn edit_profile(&mut self, edit: impl FnOnce(&mut ConnectionProfile)) {
        edit(&mut self.profile);
        self.status = ConnectionStatus::Idle;
    }

    /// Reads the remembered profile. Unreadable or corrupt entries are
    /// logged and treated as absent.
    pub fn load_persisted_profile(&mut self) -> Option<ConnectionProfile> {
        let mut profile = self.read_persisted()?;
        if let Some(key) = password_key(&profile) {
            match self.secrets().get(&key) {
                Ok(Some(password)) => profile.password = Password::new(password),
                Ok(None) => {}
                Err(err) => tracing::error!("Failed to read saved password: {err:?}"),
            }
        }
        self.profile = profile.clone();
        self.status = ConnectionStatus::Idle;
        Some(profile)
    }

    /// Runs test, then info, then save, each only after the previous step
    /// answered. Fails only when the test step does.
    pub async fn test_connection(
        &mut self,
        profile: ConnectionProfile,
    ) -> ClientResult<ConnectedProfile> {
        self.profile = profile.clone();
        self.status = ConnectionStatus::Idle;

        if let Err(err) = profile.validate() {
            self.status = ConnectionStatus::Error {
                message: err.user_message(),
            };
            return Err(err);
        }

        tracing::info!(target_db = %profile.label(), ssl_mode = %profile.ssl_mode, "testing connection");
        if let Err(err) = self.backend.test_connection(&profile).await {
            if err.is_transport() {
                tracing::warn!(detail = err.detail(), "connection test got no usable response");
            } else {
                tracing::info!("connection test rejected: {err}");
            }
            self.status = ConnectionStatus::Error {
                message: err.user_message(),
            };
            return Err(err);
        }
        self.status = ConnectionStatus::Success { info: None };

        let (info, info_error) = match self.backend.database_info(&profile).await {
            Ok(info) => (Some(info), None),
            Err(err) => {
                tracing::warn!(detail = err.detail(), "database info unavailable: {err}");
                (None, Some(err))
            }
        };
        self.status = ConnectionStatus::Success { info: info.clone() };

        let (saved, save_error) = match self.backend.save_connection(&profile).await {
            Ok(saved) if saved.id.is_some() => (Some(saved), None),
            Ok(_) => (
                None,
                Some(ClientError::malformed("saved connection carried no id")),
            ),
            Err(err) => (None, Some(err)),
        };
        if let Some(err) = &save_error {
            tracing::warn!(detail = err.detail(), "connection not saved: {err}");
        }

        let Some(mut saved) = saved else {
            return Ok(ConnectedProfile {
                profile,
                info,
                info_error,
                save_error,
                persisted: false,
            });
        };
        if saved.password.is_empty() {
            saved.password = profile.password.clone();
        }

        let persisted = info_error.is_none() && self.persist(&saved);
        tracing::info!(database_id = saved.id.as_deref().unwrap_or_default(), persisted, "connection established");
        self.profile = saved.clone();
        self.connected = Some(saved.clone());

        Ok(ConnectedProfile {
            profile: saved,
            info,
            info_error,
            save_error: None,
            persisted,
        })
    }

    /// Tests the remembered profile again, if there is one.
    pub async fn reconnect(&mut self) -> Option<ClientResult<ConnectedProfile>> {
        let profile = self.load_persisted_profile()?;
        Some(self.test_connection(profile).await)
    }

    /// Forgets the remembered profile and returns a fresh default draft.
    pub fn clear_persisted(&mut self) -> ConnectionProfile {
        if let Some(key) = self.read_persisted().as_ref().and_then(password_key) {
            if let Err(err) = self.secrets().remove(&key) {
                tracing::error!("Failed to remove saved password: {err:?}");
            }
        }
        if let Err(err) = self.store.remove(LAST_CONNECTION_KEY) {
            tracing::error!("Failed to remove saved connection: {err:?}");
        }
        self.profile = ConnectionProfile::default();
        self.status = ConnectionStatus::Idle;
        self.connected = None;
        self.profile.clone()
    }

    fn secrets(&self) -> &dyn PersistenceStore {
        match &self.secrets {
            Some(secrets) => secrets.as_ref(),
            None => &self.store,
        }
    }

    fn read_persisted(&self) -> Option<ConnectionProfile> {
        let raw = match self.store.get(LAST_CONNECTION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!("Failed to read saved connection: {err:?}");
                return None;
            }
        };
        match serde_json::from_str::<ConnectionProfile>(&raw) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::error!("Failed to load saved connection: {err}");
                None
            }
        }
    }

    fn persist(&self, profile: &ConnectionProfile) -> bool {
        let Some(key) = password_key(profile) else {
            return false;
        };
        let previous = self.read_persisted().as_ref().and_then(password_key);
        if let Err(err) = self.secrets().set(&key, profile.password.expose()) {
            tracing::error!("Failed to save password: {err:?}");
            return false;
        }
        if let Some(stale) = previous.filter(|stale| *stale != key) {
            if let Err(err) = self.secrets().remove(&stale) {
                tracing::warn!("Failed to remove previous password: {err:?}");
            }
        }

        let stored = ConnectionProfile {
            password: Password::default(),
            ..profile.clone()
        };
        let serialized = match serde_json::to_string(&stored) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::error!("Failed to serialize connection: {err}");
                return false;
            }
        };
        match self.store.set(LAST_CONNECTION_KEY, &serialized) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("Failed to save connection: {err:?}");
                false
            }
        }
    }
}
