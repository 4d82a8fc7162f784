//! Human-readable hints for I/O errors.
//!
//! Builds the messages carried by `FsError`: operation, path, the OS error and,
//! when the error code is recognized, a short actionable hint.
//!
//! Usage:
//!   let msg = describe_io_error("rename", "a/b", &err);

use std::io;

/// Hint for a raw OS error code, if we know one.
fn hint_for_code(code: i32) -> Option<&'static str> {
    #[cfg(unix)]
    {
        match code {
            libc::EACCES | libc::EPERM => Some("permission denied; check ownership and permissions"),
            libc::EXDEV => Some("cross-filesystem; atomic rename not possible"),
            libc::EBUSY => Some("resource busy; ensure no other process is writing"),
            libc::ENOENT => Some("path not found; verify it exists"),
            libc::EEXIST => Some("already exists; pick a unique name or remove the target"),
            libc::ENOSPC => Some("insufficient space on device"),
            libc::EROFS => Some("read-only filesystem; cannot write here"),
            libc::ELOOP => Some("too many symbolic link levels; possible symlink cycle"),
            libc::ENOTDIR => Some("a path component is not a directory"),
            libc::ENAMETOOLONG => Some("filename or path too long; shorten path segments"),
            libc::EMFILE => Some("process file descriptor limit reached; close files or raise limits"),
            libc::ENFILE => Some("system-wide file table overflow; reduce open files"),
            _ => None,
        }
    }
    #[cfg(windows)]
    {
        match code {
            5 => Some("access denied; check permissions"),       // ERROR_ACCESS_DENIED
            17 => Some("not same device; cross-filesystem move"), // ERROR_NOT_SAME_DEVICE
            32 => Some("sharing violation; file is in use"),     // ERROR_SHARING_VIOLATION
            2 | 3 => Some("path not found; verify it exists"),   // FILE/PATH NOT FOUND
            80 => Some("already exists; pick a unique name"),    // ERROR_FILE_EXISTS
            112 => Some("insufficient disk space"),              // ERROR_DISK_FULL
            19 => Some("write protected / read-only media"),     // ERROR_WRITE_PROTECT
            206 => Some("filename or path too long"),            // ERROR_FILENAME_EXCED_RANGE
            4 => Some("too many open files; close handles or increase limit"),
            _ => None,
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = code;
        None
    }
}

/// Hint derived from the error kind, used when there is no raw OS code
/// (errors produced by in-memory filesystems, for instance).
fn hint_for_kind(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::PermissionDenied => Some("permission denied; check ownership and permissions"),
        io::ErrorKind::NotFound => Some("path not found; verify it exists"),
        io::ErrorKind::AlreadyExists => Some("already exists; remove or choose a unique name"),
        io::ErrorKind::CrossesDevices => Some("cross-filesystem; atomic rename not possible"),
        io::ErrorKind::StorageFull => Some("insufficient space on device"),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
            Some("busy/timed out; retry after the current write finishes")
        }
        _ => None,
    }
}

/// Format `op 'path': error; hint [os code: N]`.
pub fn describe_io_error(op: &str, path: &str, e: &io::Error) -> String {
    let mut msg = format!("{op} '{path}': {e}");

    match e.raw_os_error() {
        Some(code) => {
            if let Some(hint) = hint_for_code(code) {
                msg.push_str("; ");
                msg.push_str(hint);
            }
            msg.push_str(&format!(" [os code: {code}]"));
        }
        None => {
            if let Some(hint) = hint_for_kind(e.kind()) {
                msg.push_str("; ");
                msg.push_str(hint);
            }
        }
    }

    msg
}
