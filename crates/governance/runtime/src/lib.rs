//! # governance-runtime
//!
//! Async runtime around the governance engine.
//!
//! - **GovernanceRuntime**: accepts events, routes them to per-collaboration
//!   workers and broadcasts the resulting directives
//! - **Platform**: the code-hosting platform surface (status checks,
//!   labels, merge), with an in-memory implementation
//! - **PlatformClient**: timeout and retry policy on every platform call
//! - **RuntimeConfig**: layered configuration (defaults, file, `GOVERN_*`)
//!
//! Deadlines run as one-shot timers that feed `DeadlineElapsed` back into
//! the owning worker; a timer whose collaboration is gone does nothing.

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod runtime;
mod worker;

pub use client::PlatformClient;
pub use config::{CheckConfig, DeadlineConfig, LoggingConfig, RuntimeConfig, WorkerConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use platform::{InMemoryPlatform, Platform};
pub use runtime::GovernanceRuntime;
