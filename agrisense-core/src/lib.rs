pub mod cache;
pub mod clients;
pub mod config;
pub mod database;
pub mod diagnosis;
pub mod errors;
pub mod recommendation;
pub mod services;
pub mod weather;

pub use config::AgriConfig;
pub use errors::{CoreError, CoreErrorKind, CoreResult};
