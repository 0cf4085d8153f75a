//! Default sqlx-backed connection handle.

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::any::{AnyConnectOptions, AnyPoolOptions};
use sqlx::{Any, Pool};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::DatasourceConfig;
use crate::db::connection::{Connector, Database};
use crate::error::OrmbootError;
use crate::model::ModelDef;

pub type AnyPool = Pool<Any>;

/// Hook for connection-level log lines; receives the elapsed duration when
/// benchmarking is enabled.
pub type QueryLog = Arc<dyn Fn(&str, Option<Duration>) + Send + Sync>;

fn default_query_log() -> QueryLog {
    Arc::new(|msg, elapsed| match elapsed {
        Some(d) => info!("[ormboot]({}ms) {}", d.as_millis(), msg),
        None => info!("[ormboot] {}", msg),
    })
}

/// Connection handle over a lazily-connected `AnyPool`.
///
/// Construction never touches the network; connectivity is only proven by
/// the startup authentication barrier pinging the pool.
pub struct SqlxDatabase {
    pool: AnyPool,
    benchmark: bool,
    log: QueryLog,
    models: RwLock<Vec<ModelDef>>,
}

impl SqlxDatabase {
    pub fn connect_lazy(cfg: &DatasourceConfig) -> Result<Self, OrmbootError> {
        Self::connect_lazy_with_log(cfg, default_query_log())
    }

    /// Same as [`Self::connect_lazy`] with a custom logging hook.
    pub fn connect_lazy_with_log(
        cfg: &DatasourceConfig,
        log: QueryLog,
    ) -> Result<Self, OrmbootError> {
        sqlx::any::install_default_drivers();
        let url = cfg.connect_url();
        let opts = AnyConnectOptions::from_str(&url)
            .map_err(|e| OrmbootError::ConnectUrl { url, source: e })?;
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect_lazy_with(opts);
        Ok(Self {
            pool,
            benchmark: cfg.benchmark,
            log,
            models: RwLock::new(Vec::new()),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

#[async_trait]
impl Database for SqlxDatabase {
    async fn ping(&self) -> Result<(), OrmbootError> {
        let started = Instant::now();
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(OrmbootError::from_ping_failure)?;
        conn.ping().await.map_err(OrmbootError::from_ping_failure)?;
        let elapsed = self.benchmark.then(|| started.elapsed());
        (self.log)("authenticate ok", elapsed);
        Ok(())
    }

    fn register_models(&self, models: Vec<ModelDef>) {
        let mut registered = self.models.write().expect("model registry poisoned");
        registered.extend(models);
    }

    fn models(&self) -> Vec<ModelDef> {
        self.models.read().expect("model registry poisoned").clone()
    }
}

/// Default connector: builds an [`SqlxDatabase`] per resolved datasource.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, cfg: &DatasourceConfig) -> Result<Arc<dyn Database>, OrmbootError> {
        Ok(Arc::new(SqlxDatabase::connect_lazy(cfg)?))
    }
}
