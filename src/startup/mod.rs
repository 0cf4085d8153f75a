//! Bootstrap fan-out and the startup authentication protocol.

use backon::{ConstantBuilder, Retryable};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::app::App;
use crate::config::Settings;
use crate::db::{AuthPhase, Connector, DatabaseHandle, SqlxConnector};
use crate::error::OrmbootError;
use crate::model::{LoadOptions, load_models};

/// Retries after the initial attempt; at most 4 connectivity checks total.
const MAX_RETRIES: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Set up every configured datasource on `app` using the default sqlx
/// connector, and register the authentication barrier.
pub async fn init(app: &mut App, settings: Settings) -> Result<(), OrmbootError> {
    init_with(app, settings, Arc::new(SqlxConnector)).await
}

/// Same as [`init`] with a caller-supplied connector.
///
/// For each resolved datasource: construct the connection handle, load model
/// definitions from `<base dir>/app/<model dir>`, register them in one
/// batch, and bind the handle under its delegate path. A duplicate delegate
/// aborts here, before any connectivity attempt. The authentication barrier
/// itself only runs on [`App::start`].
pub async fn init_with(
    app: &mut App,
    settings: Settings,
    connector: Arc<dyn Connector>,
) -> Result<(), OrmbootError> {
    let mut handles = Vec::new();
    for cfg in settings.resolve() {
        let db = connector.connect(&cfg).await?;

        let model_dir = app.base_dir().join("app").join(&cfg.base_dir);
        let delegate = cfg.delegate.clone();
        let opts = LoadOptions {
            exclude: cfg.exclude.clone(),
            define: cfg.define,
        };
        let models = load_models(&model_dir, &opts, |model| {
            model.connection = Some(delegate.clone());
        })?;
        info!(
            delegate = %cfg.delegate,
            path = %model_dir.display(),
            count = models.len(),
            "models loaded"
        );
        db.register_models(models);

        let handle = Arc::new(DatabaseHandle::new(cfg, db));
        app.registry_mut().bind(handle.clone())?;
        handles.push(handle);
    }

    app.before_start(authenticate_all(handles));
    Ok(())
}

/// Verify connectivity on one handle with the bounded retry protocol.
///
/// Retries only on `ConnectErrorKind::Refused`, at most [`MAX_RETRIES`]
/// times with a fixed 2 s pause and a warning per retry; every other
/// failure propagates immediately. The terminal phase is recorded on the
/// handle's own [`crate::db::AuthState`].
pub async fn authenticate(handle: &DatabaseHandle) -> Result<(), OrmbootError> {
    let policy = ConstantBuilder::default()
        .with_delay(RETRY_DELAY)
        .with_max_times(MAX_RETRIES);

    let result = (|| async { handle.database().ping().await })
        .retry(policy)
        .when(|e: &OrmbootError| e.is_connection_refused())
        .notify(|err: &OrmbootError, _dur: Duration| {
            let retry = handle.auth().record_retry();
            warn!(
                delegate = %handle.delegate(),
                retry,
                error = %err,
                "connection refused, sleeping 2 seconds to retry"
            );
        })
        .await;

    match result {
        Ok(()) => {
            handle.auth().set_phase(AuthPhase::Authenticated);
            Ok(())
        }
        Err(e) => {
            handle.auth().set_phase(AuthPhase::Failed);
            Err(e)
        }
    }
}

/// Authenticate every handle concurrently.
///
/// Resolves once all handles reach `Authenticated`; returns the first
/// failure as soon as it happens. Handles still retrying when another
/// fails are not cancelled — they run to their own terminal state on the
/// runtime.
pub async fn authenticate_all(handles: Vec<Arc<DatabaseHandle>>) -> Result<(), OrmbootError> {
    let mut tasks: FuturesUnordered<_> = handles
        .into_iter()
        .map(|handle| tokio::spawn(async move { authenticate(&handle).await }))
        .collect();

    while let Some(joined) = tasks.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(OrmbootError::BarrierPanic(join_err.to_string())),
        }
    }
    Ok(())
}
