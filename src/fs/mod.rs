//! Filesystem capability surface.
//!
//! Every primitive in this crate works through a [`Filesystem`] handle bound to a
//! root; nothing touches the OS directly. Paths handed to a handle are
//! slash-separated and relative to that root.
//!
//! Two handles are the same filesystem only when they are the same instance
//! ([`same_filesystem`]); equal root text does not count.

mod basic;
mod fake;

pub use basic::{BasicFilesystem, CrossDevicePredicate, is_cross_device};
pub use fake::FakeFilesystem;

use std::fmt;
use std::io::{self, Read, Write};
use std::time::SystemTime;

use crate::errors::FsError;

/// Classification of a filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    /// Sockets, FIFOs, devices.
    Other,
    /// The entry does not exist.
    Absent,
    /// Whether the entry exists could not be determined.
    Inaccessible,
}

impl EntryKind {
    /// True for the kinds that describe an entry that exists.
    pub fn is_present(self) -> bool {
        matches!(
            self,
            EntryKind::File | EntryKind::Dir | EntryKind::Symlink | EntryKind::Other
        )
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryKind::File => "file",
            EntryKind::Dir => "directory",
            EntryKind::Symlink => "symlink",
            EntryKind::Other => "other",
            EntryKind::Absent => "absent",
            EntryKind::Inaccessible => "inaccessible",
        };
        f.write_str(s)
    }
}

/// Identity of the underlying file, independent of the path used to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

/// What `lstat`/`stat` report about an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    pub len: u64,
    /// Permission bits (`0o777` mask).
    pub mode: u32,
    pub modified: SystemTime,
    /// `None` when the backend cannot tell (non-Unix disks).
    pub file_id: Option<FileId>,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    /// True only when both sides report an identity and it matches.
    pub fn same_file(&self, other: &Metadata) -> bool {
        matches!((self.file_id, other.file_id), (Some(a), Some(b)) if a == b)
    }
}

/// Backing store of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemType {
    Basic,
    Fake,
}

/// Writable stream returned by [`Filesystem::create`].
pub trait WriteFile: Write + Send {
    /// Flush buffered data and force it to durable storage.
    fn sync_all(&mut self) -> io::Result<()>;
}

/// Operations a synchronization engine needs from a filesystem.
pub trait Filesystem: Send + Sync + fmt::Debug {
    /// Metadata of `path` without following a final symlink.
    fn lstat(&self, path: &str) -> Result<Metadata, FsError>;

    /// Metadata of `path`, following symlinks.
    fn stat(&self, path: &str) -> Result<Metadata, FsError>;

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, FsError>;

    /// Create `path` for writing, truncating existing content.
    fn create(&self, path: &str) -> Result<Box<dyn WriteFile>, FsError>;

    /// Rename within this filesystem. A rename the backend cannot perform
    /// because it crosses storage boundaries fails with [`FsError::CrossDevice`].
    fn rename(&self, from: &str, to: &str) -> Result<(), FsError>;

    /// Remove a file, symlink or empty directory.
    fn remove(&self, path: &str) -> Result<(), FsError>;

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), FsError>;

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError>;

    fn chtimes(&self, path: &str, modified: SystemTime) -> Result<(), FsError>;

    /// Create a symlink at `link` pointing at `target` (stored verbatim).
    fn symlink(&self, target: &str, link: &str) -> Result<(), FsError>;

    fn uri(&self) -> String;

    fn fs_type(&self) -> FilesystemType;
}

/// Identity comparison of two handles.
pub fn same_filesystem(a: &dyn Filesystem, b: &dyn Filesystem) -> bool {
    std::ptr::addr_eq(a as *const dyn Filesystem, b as *const dyn Filesystem)
}

/// `lstat` folded into an [`EntryKind`]; absent and inaccessible stay distinct.
pub fn classify(fs: &dyn Filesystem, path: &str) -> EntryKind {
    match fs.lstat(path) {
        Ok(meta) => meta.kind,
        Err(e) if e.is_not_found() => EntryKind::Absent,
        Err(_) => EntryKind::Inaccessible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_by_instance_not_root() {
        let a = FakeFilesystem::with_uri("same");
        let b = FakeFilesystem::with_uri("same");
        assert!(same_filesystem(&a, &a));
        assert!(!same_filesystem(&a, &b));
        assert_eq!(a.uri(), b.uri());
    }

    #[test]
    fn classify_reports_absent_and_present() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("dir", 0o755).unwrap();
        assert_eq!(classify(&fs, "dir"), EntryKind::Dir);
        assert_eq!(classify(&fs, "nope"), EntryKind::Absent);
        assert!(EntryKind::Dir.is_present());
        assert!(!EntryKind::Inaccessible.is_present());
    }

    #[test]
    fn classify_reports_inaccessible() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("locked", 0o755).unwrap();
        fs.chmod("locked", 0o000).unwrap();
        assert_eq!(classify(&fs, "locked"), EntryKind::Dir);
        assert_eq!(classify(&fs, "locked/child"), EntryKind::Inaccessible);
    }
}
