//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → pipeline components built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod size;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AccessConfig, ForwardConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, UpstreamConfig};
