//! Core configuration types.
//! - Config holds runtime settings with sensible defaults.
//! - LogLevel represents verbosity with simple parsing helpers.

use anyhow::{Result, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::copy::DEFAULT_BUF_SIZE;
use crate::mover::MoveOptions;

/// Program-defined verbosity levels exposed to users/config.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Only errors
    Quiet,
    /// Informational output (default)
    #[default]
    Normal,
    /// Per-decision detail
    Info,
    /// Debug/trace, including every lstat step
    Debug,
}

impl LogLevel {
    /// Parse common string names into our LogLevel (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" | "error" | "none" => Some(LogLevel::Quiet),
            "normal" => Some(LogLevel::Normal),
            "info" | "verbose" | "detailed" => Some(LogLevel::Info),
            "debug" | "trace" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Quiet => "quiet",
            LogLevel::Normal => "normal",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid log level: '{s}'"))
    }
}

/// Runtime configuration for the primitives and their logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Console verbosity
    pub log_level: LogLevel,
    /// Optional path to a log file
    pub log_file: Option<PathBuf>,
    /// Emit JSON log lines instead of compact text
    pub json_logs: bool,
    /// Copy buffer size in bytes
    pub buffer_size: usize,
    /// Carry permissions and mtime over to copied files
    pub preserve_metadata: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Normal,
            log_file: None,
            json_logs: false,
            buffer_size: DEFAULT_BUF_SIZE,
            preserve_metadata: false,
        }
    }
}

impl Config {
    /// Reject settings the primitives cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            bail!("buffer_size must be greater than zero");
        }
        if let Some(p) = &self.log_file {
            if p.as_os_str().is_empty() {
                bail!("log_file must not be empty when set");
            }
        }
        Ok(())
    }

    /// Options for [`rename_or_copy_with`](crate::mover::rename_or_copy_with).
    pub fn move_options(&self) -> MoveOptions {
        MoveOptions {
            buffer_size: self.buffer_size,
            preserve_metadata: self.preserve_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parsing() {
        assert_eq!(LogLevel::parse("TRACE"), Some(LogLevel::Debug));
        assert_eq!(" quiet ".parse::<LogLevel>(), Ok(LogLevel::Quiet));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Info.to_string(), "info");
    }

    #[test]
    fn defaults_validate_and_map_to_move_options() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.move_options(), MoveOptions::default());
    }

    #[test]
    fn zero_buffer_rejected() {
        let cfg = Config {
            buffer_size: 0,
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("buffer_size"));
    }
}
