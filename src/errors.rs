//! Typed error definitions for syncfs_util.
//! `FsError` tags what went wrong on a single filesystem call so callers can branch on it;
//! `MoveError` tells a caller whether data can have been lost during a move (it never is).

use std::io;
use thiserror::Error;

use crate::helpers::describe_io_error;

/// Failure of one call on a [`Filesystem`](crate::fs::Filesystem) handle.
#[derive(Debug, Error)]
pub enum FsError {
    /// The entry (or one of its parents) does not exist.
    #[error("{}", describe_io_error(.op, .path, .source))]
    NotFound {
        op: &'static str,
        path: String,
        source: io::Error,
    },

    /// Existence or content could not be determined because access was refused.
    #[error("{}", describe_io_error(.op, .path, .source))]
    PermissionDenied {
        op: &'static str,
        path: String,
        source: io::Error,
    },

    /// A rename would cross a storage boundary.
    #[error("{}", describe_io_error(.op, .path, .source))]
    CrossDevice {
        op: &'static str,
        path: String,
        source: io::Error,
    },

    /// Anything else.
    #[error("{}", describe_io_error(.op, .path, .source))]
    Io {
        op: &'static str,
        path: String,
        source: io::Error,
    },
}

impl FsError {
    /// Classify an `io::Error` into not-found / permission / other.
    ///
    /// Cross-device classification is backend specific, so it is never inferred
    /// here; see [`FsError::cross_device`].
    pub fn from_io(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound { op, path, source },
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied { op, path, source },
            _ => FsError::Io { op, path, source },
        }
    }

    pub fn cross_device(op: &'static str, path: impl Into<String>, source: io::Error) -> Self {
        FsError::CrossDevice {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, FsError::PermissionDenied { .. })
    }

    pub fn is_cross_device(&self) -> bool {
        matches!(self, FsError::CrossDevice { .. })
    }

    /// Path the failing operation was applied to.
    pub fn path(&self) -> &str {
        match self {
            FsError::NotFound { path, .. }
            | FsError::PermissionDenied { path, .. }
            | FsError::CrossDevice { path, .. }
            | FsError::Io { path, .. } => path,
        }
    }

    /// The underlying OS (or simulated) error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            FsError::NotFound { source, .. }
            | FsError::PermissionDenied { source, .. }
            | FsError::CrossDevice { source, .. }
            | FsError::Io { source, .. } => source,
        }
    }
}

/// Failure of [`rename_or_copy`](crate::mover::rename_or_copy).
///
/// Every variant leaves the data intact: either the source was never removed,
/// or (for [`MoveError::CleanupFailed`]) the destination is complete and a
/// duplicate source remains.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("move source '{path}' not found")]
    SourceNotFound { path: String },

    #[error("move source '{path}' is not a regular file")]
    SourceNotFile { path: String },

    /// Rename failed for a reason other than crossing devices.
    #[error("rename '{from}' -> '{to}' failed")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: FsError,
    },

    #[error("reading move source '{path}' failed")]
    SourceRead {
        path: String,
        #[source]
        source: FsError,
    },

    #[error("writing move destination '{path}' failed")]
    DestinationWrite {
        path: String,
        #[source]
        source: FsError,
    },

    /// Both paths reach the same file through different handles; nothing was
    /// touched.
    #[error("'{src}' and '{dst}' are the same file; nothing moved")]
    SameFile { src: String, dst: String },

    /// The copy finished and is durable, but the original could not be removed.
    #[error("'{dst}' written but removing source '{src}' failed")]
    CleanupFailed {
        src: String,
        dst: String,
        #[source]
        source: FsError,
    },
}

impl MoveError {
    /// True when the destination holds the full content of the source.
    pub fn destination_complete(&self) -> bool {
        matches!(self, MoveError::CleanupFailed { .. })
    }

    /// The filesystem error underneath, if any.
    pub fn fs_error(&self) -> Option<&FsError> {
        match self {
            MoveError::SourceNotFound { .. }
            | MoveError::SourceNotFile { .. }
            | MoveError::SameFile { .. } => None,
            MoveError::Rename { source, .. }
            | MoveError::SourceRead { source, .. }
            | MoveError::DestinationWrite { source, .. }
            | MoveError::CleanupFailed { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_io_tags_by_kind() {
        let nf = FsError::from_io("lstat", "a/b", io::Error::from(io::ErrorKind::NotFound));
        assert!(nf.is_not_found());
        assert_eq!(nf.path(), "a/b");

        let perm = FsError::from_io("lstat", "a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(perm.is_permission());

        let other = FsError::from_io("read", "a", io::Error::other("disk on fire"));
        assert!(matches!(other, FsError::Io { .. }));
        assert!(!other.is_cross_device());
    }

    #[test]
    fn display_carries_op_and_path() {
        let e = FsError::from_io("open", "dir/file", io::Error::from(io::ErrorKind::NotFound));
        let msg = e.to_string();
        assert!(msg.contains("open 'dir/file'"), "msg was: {msg}");
    }

    #[test]
    fn only_cleanup_failure_has_complete_destination() {
        let cleanup = MoveError::CleanupFailed {
            src: "a".into(),
            dst: "b".into(),
            source: FsError::from_io("remove", "a", io::Error::from(io::ErrorKind::PermissionDenied)),
        };
        assert!(cleanup.destination_complete());
        assert!(cleanup.fs_error().is_some_and(FsError::is_permission));

        let aliased = MoveError::SameFile {
            src: "f".into(),
            dst: "f".into(),
        };
        assert!(!aliased.destination_complete());
        assert!(aliased.fs_error().is_none());

        let missing = MoveError::SourceNotFound { path: "a".into() };
        assert!(!missing.destination_complete());
        assert!(missing.fs_error().is_none());
    }
}
