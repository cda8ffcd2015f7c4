pub mod config;
pub mod database;
pub mod models;

pub use config::Config;
pub use database::{SnapshotStore, StoreError};
pub use models::*;
