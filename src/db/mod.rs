//! Connection handles and the collaborator seams around them.
//!
//! Layout:
//! - `connection.rs`: the `Database`/`Connector` traits, the registry-visible
//!   `DatabaseHandle` and its startup authentication state
//! - `pool.rs`: the default sqlx-backed connector (lazy `AnyPool`)

pub mod connection;
pub mod pool;

pub use connection::{AuthPhase, AuthState, Connector, Database, DatabaseHandle};
pub use pool::{QueryLog, SqlxConnector, SqlxDatabase};
