//! Licitaciones CLI library
//!
//! Exposes configuration, logging and the HTTP service for integration
//! testing.

pub mod cli;
pub mod config;
pub mod logging;
pub mod server;

pub use config::{load_config, AppConfig, LoadedConfig};

pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const GIT_HASH: &str = env!("GIT_HASH");
