//! # Forking Core Library
//!
//! Shared foundation for the forking control-socket service and its clients.
//!
//! ## Modules
//! - `timeouts`: Named, overridable durations driving every wait and poll.
//! - `config`: Bind address and layered daemon settings.
//! - `args`: Standardized connection arguments shared by the binaries.
//! - `fs`: Per-worker directory layout, named pipes and the pid file.
//! - `logging`: `env_logger` initialisation.
//! - `error`: The crate-wide error type.

pub mod args;
pub mod config;
pub mod error;
pub mod fs;
pub mod logging;
pub mod timeouts;

pub use config::{DaemonSettings, ServiceConfig, WorkerSettings};
pub use error::{Result, ServiceError};
pub use timeouts::Timeouts;
