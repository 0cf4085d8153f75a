//! Host-application context: delegate registry plus the startup barrier.

pub mod registry;

pub use registry::{DelegateRegistry, RequestScope, RequestView};

use futures::future::{BoxFuture, try_join_all};
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::OrmbootError;

pub type BarrierTask = BoxFuture<'static, Result<(), OrmbootError>>;

/// Application context owning the bound connection handles and the tasks
/// that must finish before the application may report ready.
pub struct App {
    base_dir: PathBuf,
    registry: DelegateRegistry,
    barrier: Vec<BarrierTask>,
}

impl App {
    /// `base_dir` is the application root; model directories resolve under
    /// `<base_dir>/app/`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            registry: DelegateRegistry::new(),
            barrier: Vec::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn registry(&self) -> &DelegateRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DelegateRegistry {
        &mut self.registry
    }

    /// Open a per-request overlay over the registry.
    pub fn request_scope(&self) -> RequestScope<'_> {
        RequestScope::new(&self.registry)
    }

    /// Register a task to run before the application is considered ready.
    /// Startup aborts if any registered task fails.
    pub fn before_start<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), OrmbootError>> + Send + 'static,
    {
        self.barrier.push(Box::pin(task));
    }

    /// Run the startup barrier: every registered task must succeed.
    pub async fn start(&mut self) -> Result<(), OrmbootError> {
        let tasks = std::mem::take(&mut self.barrier);
        if tasks.is_empty() {
            return Ok(());
        }
        match try_join_all(tasks).await {
            Ok(_) => {
                info!(delegates = self.registry.len(), "startup barrier passed");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "startup barrier failed");
                Err(e)
            }
        }
    }
}
