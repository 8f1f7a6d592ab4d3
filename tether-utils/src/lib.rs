//! tether-utils: Common utilities shared across tether crates
//!
//! This crate provides:
//! - Unified error types ([`TetherError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`build_dispatch`], [`LogConfig`])
//! - Connection parameter discovery ([`resolve_descriptor`], [`ConnectionDescriptor`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod discovery;
pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use discovery::{resolve_descriptor, ConnectionDescriptor, DiscoveryOptions};
pub use error::{Result, TetherError, BAD_RESPONSE};
pub use logging::{build_dispatch, init_logging, init_logging_with_config, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{config_dir, config_file, log_dir, state_dir};
