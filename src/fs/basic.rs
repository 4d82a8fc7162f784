//! Real-disk filesystem handle bound to a root directory.
//! - Paths are resolved component by component below the root; `..` and
//!   absolute components are refused so no call can leave the root.
//! - Cross-device classification of rename failures is a pluggable predicate.
//! - On Unix, a successful rename fsyncs the destination directory (best-effort).

use filetime::{FileTime, set_file_mtime};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

use super::{EntryKind, Filesystem, FilesystemType, Metadata, WriteFile};
use crate::errors::FsError;
use crate::path::components;

/// Decides whether a failed rename crossed a storage boundary.
pub type CrossDevicePredicate = fn(&io::Error) -> bool;

/// Default predicate: EXDEV on Unix, ERROR_NOT_SAME_DEVICE on Windows, or an
/// error whose kind already says so.
pub fn is_cross_device(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    match e.raw_os_error() {
        #[cfg(unix)]
        Some(code) => code == libc::EXDEV,
        // ERROR_NOT_SAME_DEVICE
        #[cfg(windows)]
        Some(code) => code == 17,
        _ => false,
    }
}

#[derive(Debug, Clone)]
pub struct BasicFilesystem {
    root: PathBuf,
    cross_device: CrossDevicePredicate,
}

impl BasicFilesystem {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: dunce::simplified(root.as_ref()).to_path_buf(),
            cross_device: is_cross_device,
        }
    }

    /// Replace the rename failure classifier (for backends with their own codes).
    pub fn with_cross_device_predicate(mut self, predicate: CrossDevicePredicate) -> Self {
        self.cross_device = predicate;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, op: &'static str, path: &str) -> Result<PathBuf, FsError> {
        let mut full = self.root.clone();
        for comp in components(path) {
            let mut parts = Path::new(comp).components();
            match (parts.next(), parts.next()) {
                (Some(Component::Normal(name)), None) => full.push(name),
                _ => {
                    return Err(FsError::from_io(
                        op,
                        path,
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("component '{comp}' escapes the filesystem root"),
                        ),
                    ));
                }
            }
        }
        Ok(full)
    }
}

fn to_metadata(meta: &fs::Metadata) -> Metadata {
    let ft = meta.file_type();
    let kind = if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Dir
    } else if ft.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };

    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o777
    };
    #[cfg(unix)]
    let file_id = {
        use std::os::unix::fs::MetadataExt;
        Some(super::FileId {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    };
    #[cfg(not(unix))]
    let file_id = None;

    #[cfg(not(unix))]
    let mode = match (meta.permissions().readonly(), kind) {
        (true, EntryKind::Dir) => 0o555,
        (true, _) => 0o444,
        (false, EntryKind::Dir) => 0o777,
        (false, _) => 0o666,
    };

    Metadata {
        kind,
        len: meta.len(),
        mode,
        modified: meta.modified().unwrap_or(UNIX_EPOCH),
        file_id,
    }
}

impl WriteFile for File {
    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

impl Filesystem for BasicFilesystem {
    fn lstat(&self, path: &str) -> Result<Metadata, FsError> {
        let full = self.resolve("lstat", path)?;
        fs::symlink_metadata(&full)
            .map(|m| to_metadata(&m))
            .map_err(|e| FsError::from_io("lstat", path, e))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let full = self.resolve("stat", path)?;
        fs::metadata(&full)
            .map(|m| to_metadata(&m))
            .map_err(|e| FsError::from_io("stat", path, e))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, FsError> {
        let full = self.resolve("open", path)?;
        let f = File::open(&full).map_err(|e| FsError::from_io("open", path, e))?;
        Ok(Box::new(f))
    }

    fn create(&self, path: &str) -> Result<Box<dyn WriteFile>, FsError> {
        let full = self.resolve("create", path)?;
        let f = File::create(&full).map_err(|e| FsError::from_io("create", path, e))?;
        Ok(Box::new(f))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let src = self.resolve("rename", from)?;
        let dst = self.resolve("rename", to)?;
        if let Err(e) = fs::rename(&src, &dst) {
            return Err(if (self.cross_device)(&e) {
                FsError::cross_device("rename", from, e)
            } else {
                FsError::from_io("rename", from, e)
            });
        }

        // A failed directory fsync must not turn a successful rename into a failure.
        #[cfg(unix)]
        if let Some(parent) = dst.parent() {
            if let Err(e) = fsync_dir(parent) {
                trace!(dir = %parent.display(), error = %e, "fsync after rename failed");
            }
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), FsError> {
        let full = self.resolve("remove", path)?;
        let meta = fs::symlink_metadata(&full).map_err(|e| FsError::from_io("remove", path, e))?;
        let res = if meta.file_type().is_dir() {
            fs::remove_dir(&full)
        } else {
            fs::remove_file(&full)
        };
        res.map_err(|e| FsError::from_io("remove", path, e))
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let full = self.resolve("mkdir", path)?;
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;
        builder
            .create(&full)
            .map_err(|e| FsError::from_io("mkdir", path, e))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let full = self.resolve("chmod", path)?;
        #[cfg(unix)]
        let perms = {
            use std::os::unix::fs::PermissionsExt;
            fs::Permissions::from_mode(mode & 0o7777)
        };
        #[cfg(not(unix))]
        let perms = {
            let mut p = fs::metadata(&full)
                .map_err(|e| FsError::from_io("chmod", path, e))?
                .permissions();
            p.set_readonly(mode & 0o200 == 0);
            p
        };
        fs::set_permissions(&full, perms).map_err(|e| FsError::from_io("chmod", path, e))
    }

    fn chtimes(&self, path: &str, modified: SystemTime) -> Result<(), FsError> {
        let full = self.resolve("chtimes", path)?;
        set_file_mtime(&full, FileTime::from_system_time(modified))
            .map_err(|e| FsError::from_io("chtimes", path, e))
    }

    fn symlink(&self, target: &str, link: &str) -> Result<(), FsError> {
        let full = self.resolve("symlink", link)?;
        let native_target = PathBuf::from(crate::path::native_filename(target));
        #[cfg(unix)]
        let res = std::os::unix::fs::symlink(&native_target, &full);
        #[cfg(windows)]
        let res = {
            let resolved = full
                .parent()
                .map(|p| p.join(&native_target))
                .unwrap_or_else(|| native_target.clone());
            if resolved.is_dir() {
                std::os::windows::fs::symlink_dir(&native_target, &full)
            } else {
                std::os::windows::fs::symlink_file(&native_target, &full)
            }
        };
        #[cfg(not(any(unix, windows)))]
        let res: io::Result<()> = {
            let _ = (&native_target, &full);
            Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks not supported"))
        };
        res.map_err(|e| FsError::from_io("symlink", link, e))
    }

    fn uri(&self) -> String {
        self.root.display().to_string()
    }

    fn fs_type(&self) -> FilesystemType {
        FilesystemType::Basic
    }
}
