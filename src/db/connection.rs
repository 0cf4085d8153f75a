use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::config::DatasourceConfig;
use crate::error::OrmbootError;
use crate::model::ModelDef;

/// One live database connection, as seen by the bootstrap layer.
///
/// Implementations must fail `ping` with [`OrmbootError::Connect`] carrying
/// a classified kind; the startup authenticator retries only on
/// `ConnectErrorKind::Refused`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Verify connectivity once.
    async fn ping(&self) -> Result<(), OrmbootError>;

    /// Register a batch of discovered model definitions.
    fn register_models(&self, models: Vec<ModelDef>);

    /// Snapshot of the registered models.
    fn models(&self) -> Vec<ModelDef>;
}

/// Factory seam for connection handles.
///
/// The default is [`crate::db::SqlxConnector`]; hosts that need a custom
/// connection class hand the bootstrap their own implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, cfg: &DatasourceConfig) -> Result<Arc<dyn Database>, OrmbootError>;
}

/// Terminal and intermediate states of startup authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    Pending,
    Authenticated,
    Failed,
}

/// Per-handle authentication state: the retry counter and terminal phase
/// live here for the startup phase and are irrelevant afterward. Each
/// handle owns its own state; nothing is shared across handles.
#[derive(Debug)]
pub struct AuthState {
    retries: AtomicU32,
    phase: AtomicU8,
}

const PHASE_PENDING: u8 = 0;
const PHASE_AUTHENTICATED: u8 = 1;
const PHASE_FAILED: u8 = 2;

impl AuthState {
    pub fn new() -> Self {
        Self {
            retries: AtomicU32::new(0),
            phase: AtomicU8::new(PHASE_PENDING),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Bump the retry counter, returning the new value.
    pub fn record_retry(&self) -> u32 {
        self.retries.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn phase(&self) -> AuthPhase {
        match self.phase.load(Ordering::Acquire) {
            PHASE_AUTHENTICATED => AuthPhase::Authenticated,
            PHASE_FAILED => AuthPhase::Failed,
            _ => AuthPhase::Pending,
        }
    }

    pub fn set_phase(&self, phase: AuthPhase) {
        let raw = match phase {
            AuthPhase::Pending => PHASE_PENDING,
            AuthPhase::Authenticated => PHASE_AUTHENTICATED,
            AuthPhase::Failed => PHASE_FAILED,
        };
        self.phase.store(raw, Ordering::Release);
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry-visible record for one configured datasource: its resolved
/// configuration, the connection, and the startup authentication state.
pub struct DatabaseHandle {
    config: DatasourceConfig,
    db: Arc<dyn Database>,
    auth: AuthState,
}

impl DatabaseHandle {
    pub fn new(config: DatasourceConfig, db: Arc<dyn Database>) -> Self {
        Self {
            config,
            db,
            auth: AuthState::new(),
        }
    }

    /// Dotted path under which this handle is exposed.
    pub fn delegate(&self) -> &str {
        &self.config.delegate
    }

    pub fn config(&self) -> &DatasourceConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }
}

impl std::fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("delegate", &self.config.delegate)
            .field("database", &self.config.database)
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_state_starts_pending_with_zero_retries() {
        let state = AuthState::new();
        assert_eq!(state.phase(), AuthPhase::Pending);
        assert_eq!(state.retries(), 0);
    }

    #[test]
    fn retry_counter_counts_up() {
        let state = AuthState::new();
        assert_eq!(state.record_retry(), 1);
        assert_eq!(state.record_retry(), 2);
        assert_eq!(state.retries(), 2);
    }

    #[test]
    fn phase_transitions_are_visible() {
        let state = AuthState::new();
        state.set_phase(AuthPhase::Authenticated);
        assert_eq!(state.phase(), AuthPhase::Authenticated);
        state.set_phase(AuthPhase::Failed);
        assert_eq!(state.phase(), AuthPhase::Failed);
    }
}
