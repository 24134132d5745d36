//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playlist sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other `core-*` crate depends on this one for its logging
//! conventions, its validated [`EngineConfig`](config::EngineConfig) and the
//! [`EventBus`](events::EventBus) used to report progress to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, EventSeverity, EventStream, RegistryEvent, SyncEvent};
