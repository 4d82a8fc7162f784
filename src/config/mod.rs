//! Config module.
//! Provides the runtime configuration types, default paths and XML loading.

pub mod paths;
pub mod types;
pub mod xml;

pub use paths::{default_config_path, path_has_symlink_ancestor};
pub use types::{Config, LogLevel};
pub use xml::{load_config, load_config_from_xml_path, parse_config_xml};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SYNCFS_UTIL_CONFIG";
