// packages/engine/src/runtime/mod.rs
//! Spoofing server runtime
//!
//! - **Spoofing Service**: start/stop contract and the managed-subprocess implementation
//! - **Supervisor**: Lifecycle state machine and graceful/fatal classification
//!
//! # Architecture
//!
//! ```text
//! Extension::load ──▶ Supervisor.start ──spawn──▶ service.start(addr)   (blocks for server lifetime)
//!                                                      │
//!                              watch<ServerState> ◀────┘ termination message
//!                                     │
//!                       fatal ──▶ FailSafe.trip ──▶ host unloads extension
//!
//! Extension::on_shutdown ──▶ Supervisor.stop ──▶ service.stop()        (returns promptly)
//! ```

pub mod spoofing_service;
pub mod supervisor;

// Re-export commonly used types
pub use spoofing_service::{ProcessService, ServiceCommand, SpoofingService, GRACEFUL_STOP_SIGNATURE};
pub use supervisor::{ServerState, ServerSupervisor, Termination};
