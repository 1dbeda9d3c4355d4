//! Wrench Core - shared types, configuration, alerts and safety scanning.
//!
//! Every other wrench crate depends on this one. Nothing here performs I/O
//! apart from loading and saving the TOML configuration file.

pub mod config;
pub mod error;
pub mod events;
pub mod safety;
pub mod types;

pub use config::WrenchConfig;
pub use error::{Result, WrenchError};
pub use events::{AlertEvent, AlertNotifier, BroadcastNotifier, MemoryNotifier, TracingNotifier};
pub use safety::{SafetyScanner, SafetySplit};
pub use types::*;
