//! Streaming copy with durability control.
//!
//! Features:
//! - Chunked copy through a single reusable buffer (1 MiB by default).
//! - Read-side and write-side failures are reported separately so a mover can
//!   tell "source unreadable" from "destination not written".
//! - Optional full fsync of the destination before returning.
//!
//! Snapshot semantics: the source is read once from start to EOF; bytes appended
//! concurrently may or may not be included. Callers that need an exact length
//! compare `CopyResult::bytes` to what they observed beforehand.

use std::io::{self, Read};
use thiserror::Error;

use crate::fs::WriteFile;

/// Default copy buffer size.
pub const DEFAULT_BUF_SIZE: usize = 1024 * 1024;

/// Durability mode controlling post-write flush behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Flush to the OS, no disk barrier. Fastest; may lose data on power loss.
    Data,
    /// Force data and metadata to stable storage (`sync_all`).
    #[default]
    Full,
}

impl DurabilityMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" | "flush" => Some(DurabilityMode::Data),
            "full" | "sync" | "fsync" => Some(DurabilityMode::Full),
            _ => None,
        }
    }
}

/// Result of a streaming copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyResult {
    /// Total bytes copied from source to destination.
    pub bytes: u64,
    pub buf_size: usize,
    pub mode: DurabilityMode,
}

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("reading source failed")]
    Read(#[source] io::Error),
    /// Writing, flushing or syncing the destination failed.
    #[error("writing destination failed")]
    Write(#[source] io::Error),
}

/// Copy everything from `reader` into `writer`, then flush (and fsync for
/// [`DurabilityMode::Full`]). A zero `buf_size` falls back to the default.
pub fn copy_stream(
    reader: &mut dyn Read,
    writer: &mut dyn WriteFile,
    buf_size: usize,
    mode: DurabilityMode,
) -> Result<CopyResult, CopyError> {
    let buf_size = if buf_size == 0 { DEFAULT_BUF_SIZE } else { buf_size };
    let mut buf = vec![0u8; buf_size];
    let mut bytes: u64 = 0;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CopyError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(CopyError::Write)?;
        bytes += n as u64;
    }

    writer.flush().map_err(CopyError::Write)?;
    if mode == DurabilityMode::Full {
        writer.sync_all().map_err(CopyError::Write)?;
    }

    Ok(CopyResult {
        bytes,
        buf_size,
        mode,
    })
}
