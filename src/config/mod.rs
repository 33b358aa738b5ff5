//! Configuration loading and validation
//!
//! The harvester reads a TOML configuration file describing the portal
//! endpoint, the PRADO form fields, the storage target, and the resume
//! state location. Every setting has a default matching the production
//! portal, so the binary also runs without a file.

mod parser;
mod types;
mod validation;

pub use parser::{load_config, load_config_or_default};
pub use types::{ApiConfig, Config, PortalConfig, StateConfig, StorageConfig};
pub use validation::validate;
