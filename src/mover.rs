//! Rename-or-copy move between filesystem handles.
//! Renames atomically when both paths live on the same handle. On a
//! cross-device failure, or when the handles differ, the content is streamed
//! into a hidden temp file next to the destination, synced, and renamed into
//! place. The source is removed only after that rename.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::copy::{CopyError, DEFAULT_BUF_SIZE, DurabilityMode, copy_stream};
use crate::errors::{FsError, MoveError};
use crate::fs::{EntryKind, Filesystem, Metadata, classify, same_filesystem};
use crate::path::components;

/// How a successful move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Renamed,
    Copied { bytes: u64 },
}

/// Knobs for the copy fallback. The copy is always synced before the source
/// goes away; there is no option to skip that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOptions {
    pub buffer_size: usize,
    /// Apply source permissions and mtime to the copied file (best-effort).
    pub preserve_metadata: bool,
}

impl Default for MoveOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUF_SIZE,
            preserve_metadata: false,
        }
    }
}

/// Move `src` on `src_fs` to `dst` on `dst_fs` with default options.
pub fn rename_or_copy(
    src_fs: &dyn Filesystem,
    dst_fs: &dyn Filesystem,
    src: &str,
    dst: &str,
) -> Result<MoveOutcome, MoveError> {
    rename_or_copy_with(src_fs, dst_fs, src, dst, &MoveOptions::default())
}

/// Move `src` on `src_fs` to `dst` on `dst_fs`.
///
/// The source is never removed unless the destination was fully written,
/// synced and renamed into place; if removing it then fails,
/// [`MoveError::CleanupFailed`] is returned and both copies exist. Handles that
/// reach the same file through different roots get [`MoveError::SameFile`].
pub fn rename_or_copy_with(
    src_fs: &dyn Filesystem,
    dst_fs: &dyn Filesystem,
    src: &str,
    dst: &str,
    opts: &MoveOptions,
) -> Result<MoveOutcome, MoveError> {
    if same_filesystem(src_fs, dst_fs) {
        match src_fs.rename(src, dst) {
            Ok(()) => {
                info!(fs = %src_fs.uri(), src, dst, "Renamed atomically");
                return Ok(MoveOutcome::Renamed);
            }
            Err(e) if e.is_cross_device() => {
                warn!(fs = %src_fs.uri(), src, dst, error = %e, "Rename crosses devices, falling back to copy+remove");
            }
            Err(e) => {
                if classify(src_fs, src) == EntryKind::Absent {
                    return Err(MoveError::SourceNotFound { path: src.to_string() });
                }
                return Err(MoveError::Rename {
                    from: src.to_string(),
                    to: dst.to_string(),
                    source: e,
                });
            }
        }
    } else {
        debug!(src_fs = %src_fs.uri(), dst_fs = %dst_fs.uri(), "different filesystems, copying");
    }

    copy_then_remove(src_fs, dst_fs, src, dst, opts)
}

fn source_error(src: &str, e: FsError) -> MoveError {
    if e.is_not_found() {
        MoveError::SourceNotFound { path: src.to_string() }
    } else {
        MoveError::SourceRead {
            path: src.to_string(),
            source: e,
        }
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique hidden sibling of `dst` for the copy to land in.
fn temp_sibling(dst: &str) -> String {
    let comps = components(dst);
    let (name, parent) = match comps.split_last() {
        Some((name, parent)) => (*name, parent.join("/")),
        None => ("", String::new()),
    };
    // Keep the temp name well under NAME_MAX.
    let short: String = name.chars().take(64).collect();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = format!(".{short}.syncfs.{}.{nanos}.{seq}.tmp", std::process::id());
    if parent.is_empty() {
        tmp
    } else {
        format!("{parent}/{tmp}")
    }
}

fn copy_then_remove(
    src_fs: &dyn Filesystem,
    dst_fs: &dyn Filesystem,
    src: &str,
    dst: &str,
    opts: &MoveOptions,
) -> Result<MoveOutcome, MoveError> {
    let meta = src_fs.lstat(src).map_err(|e| source_error(src, e))?;
    if !meta.is_file() {
        return Err(MoveError::SourceNotFile { path: src.to_string() });
    }

    // Distinct handles may still share bytes (same root, nested roots, clones).
    if let Ok(existing) = dst_fs.lstat(dst) {
        if existing.same_file(&meta) {
            warn!(src_fs = %src_fs.uri(), dst_fs = %dst_fs.uri(), src, dst, "source and destination are the same file, nothing moved");
            return Err(MoveError::SameFile {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }
    }

    let tmp = temp_sibling(dst);
    let bytes = match copy_to_temp(src_fs, dst_fs, src, dst, &tmp, &meta, opts) {
        Ok(bytes) => bytes,
        Err(err) => {
            discard_temp(dst_fs, &tmp);
            return Err(err);
        }
    };
    if let Err(e) = dst_fs.rename(&tmp, dst) {
        discard_temp(dst_fs, &tmp);
        return Err(MoveError::DestinationWrite {
            path: dst.to_string(),
            source: e,
        });
    }

    if let Err(e) = src_fs.remove(src) {
        warn!(fs = %src_fs.uri(), src, dst, error = %e, "Copied, but removing the source failed");
        return Err(MoveError::CleanupFailed {
            src: src.to_string(),
            dst: dst.to_string(),
            source: e,
        });
    }

    info!(src_fs = %src_fs.uri(), dst_fs = %dst_fs.uri(), src, dst, bytes, "Copied and removed source");
    Ok(MoveOutcome::Copied { bytes })
}

/// Stream `src` into `tmp`, synced, with metadata applied when asked.
fn copy_to_temp(
    src_fs: &dyn Filesystem,
    dst_fs: &dyn Filesystem,
    src: &str,
    dst: &str,
    tmp: &str,
    meta: &Metadata,
    opts: &MoveOptions,
) -> Result<u64, MoveError> {
    let dest_err = |source: FsError| MoveError::DestinationWrite {
        path: dst.to_string(),
        source,
    };

    let mut reader = src_fs.open(src).map_err(|e| source_error(src, e))?;
    let mut writer = dst_fs.create(tmp).map_err(dest_err)?;
    let copied = copy_stream(reader.as_mut(), writer.as_mut(), opts.buffer_size, DurabilityMode::Full);
    // Destination closes before the source.
    drop(writer);
    drop(reader);

    match copied {
        Ok(res) if res.bytes == meta.len => {}
        Ok(res) => {
            return Err(dest_err(FsError::from_io(
                "copy",
                tmp,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short copy: source has {} bytes, copied {}", meta.len, res.bytes),
                ),
            )));
        }
        Err(CopyError::Read(e)) => {
            return Err(MoveError::SourceRead {
                path: src.to_string(),
                source: FsError::from_io("read", src, e),
            });
        }
        Err(CopyError::Write(e)) => return Err(dest_err(FsError::from_io("write", tmp, e))),
    }

    if opts.preserve_metadata {
        preserve_metadata(dst_fs, tmp, meta);
    }
    Ok(meta.len)
}

/// Best-effort removal of an abandoned temp file. Never touches `dst`.
fn discard_temp(dst_fs: &dyn Filesystem, tmp: &str) {
    match dst_fs.remove(tmp) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => debug!(fs = %dst_fs.uri(), tmp, error = %e, "could not remove temp file"),
    }
}

fn preserve_metadata(dst_fs: &dyn Filesystem, path: &str, src_meta: &Metadata) {
    if let Err(e) = dst_fs.chmod(path, src_meta.mode) {
        warn!(path, mode = format_args!("{:o}", src_meta.mode), error = %e, "failed to set permissions on destination");
    }
    if let Err(e) = dst_fs.chtimes(path, src_meta.modified) {
        warn!(path, error = %e, "failed to set mtime on destination");
    }
}
