pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod startup;

pub use app::App;
pub use config::Settings;
pub use db::{Connector, Database, DatabaseHandle};
pub use error::{ConnectErrorKind, OrmbootError};
pub use startup::{authenticate, authenticate_all, init, init_with};
