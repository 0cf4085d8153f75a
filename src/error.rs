use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

/// Classification of a failed connectivity check.
///
/// Only `Refused` is considered transient by the startup authenticator;
/// every other kind aborts immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// The server actively refused the connection (typically not up yet).
    Refused,
    /// The server rejected the supplied credentials.
    AccessDenied,
    /// Host could not be resolved or reached.
    UnknownHost,
    /// The attempt timed out before the server answered.
    Timeout,
    /// Anything else (protocol errors, TLS failures, driver bugs).
    Other,
}

impl std::fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Refused => "connection refused",
            Self::AccessDenied => "access denied",
            Self::UnknownHost => "unknown host",
            Self::Timeout => "timeout",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, ThisError)]
pub enum OrmbootError {
    #[error("delegate `{0}` is already defined")]
    DuplicateDelegate(String),

    #[error("delegate `{0}` conflicts with already defined `{1}`")]
    DelegateConflict(String, String),

    #[error("connect error ({kind}): {message}")]
    Connect {
        kind: ConnectErrorKind,
        message: String,
    },

    #[error("config error: {0}")]
    Config(#[from] figment::Error),

    #[error("invalid connect url `{url}`: {source}")]
    ConnectUrl { url: String, source: SqlxError },

    #[error("model load error at {path}: {source}")]
    ModelLoad {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] SqlxError),

    #[error("startup barrier task panicked: {0}")]
    BarrierPanic(String),
}

impl OrmbootError {
    /// The connect-error kind, if this is a connectivity failure.
    pub fn connect_kind(&self) -> Option<ConnectErrorKind> {
        match self {
            Self::Connect { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the startup authenticator may retry after this failure.
    pub fn is_connection_refused(&self) -> bool {
        self.connect_kind() == Some(ConnectErrorKind::Refused)
    }

    /// Wrap a sqlx failure from a connectivity check into a classified
    /// `Connect` error.
    pub fn from_ping_failure(e: SqlxError) -> Self {
        Self::Connect {
            kind: classify_sqlx(&e),
            message: e.to_string(),
        }
    }
}

/// Map a `sqlx::Error` onto the connect-error taxonomy.
///
/// sqlx surfaces a refused TCP connect as an `Io` error, so the io error
/// kind is authoritative there; database-level errors (wrong password,
/// unknown database) come back as `Database` and are never transient.
pub fn classify_sqlx(e: &SqlxError) -> ConnectErrorKind {
    match e {
        SqlxError::Io(io) => match io.kind() {
            std::io::ErrorKind::ConnectionRefused => ConnectErrorKind::Refused,
            std::io::ErrorKind::TimedOut => ConnectErrorKind::Timeout,
            _ => ConnectErrorKind::Other,
        },
        SqlxError::Tls(_) => ConnectErrorKind::Other,
        SqlxError::PoolTimedOut => ConnectErrorKind::Timeout,
        SqlxError::Database(db) => {
            // MySQL 1045 / SQLSTATE 28000, Postgres 28P01: bad credentials.
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            if code == "28000" || code == "28P01" || code == "1045" {
                ConnectErrorKind::AccessDenied
            } else {
                ConnectErrorKind::Other
            }
        }
        SqlxError::Configuration(_) => ConnectErrorKind::UnknownHost,
        _ => ConnectErrorKind::Other,
    }
}
