// packages/engine/src/utils/mod.rs
//! Common utilities
//!
//! - **config**: Process configuration (listener, settings database, spoofing server command)
//! - **errors**: Engine-wide error type

pub mod config;
pub mod errors;

pub use self::config::EngineConfig;
pub use self::errors::{EngineError, Result};
