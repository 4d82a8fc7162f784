//! Symlink-safe deletion check.
//!
//! Decides whether a path the sync tree believes in should be considered
//! deleted on disk. The path is walked one component at a time with `lstat`,
//! so the OS never resolves a symlink in the middle of the path for us:
//! - a missing component means deleted;
//! - an intermediate component that is not a real directory (a file, or a
//!   symlink even if it points at a directory) means deleted;
//! - a component whose existence cannot be determined means NOT deleted, so a
//!   permission problem never turns into a delete decision;
//! - a final component that exists in any form (file, directory, symlink,
//!   dangling or not) means not deleted.

use tracing::{debug, trace};

use crate::fs::{EntryKind, Filesystem, classify};
use crate::path::components;

/// Whether `path` should be treated as deleted from `fs`.
///
/// Never fails: filesystem errors are folded into the answer as described in
/// the module docs. One `lstat` per path component, no retries.
pub fn is_deleted(fs: &dyn Filesystem, path: &str) -> bool {
    let comps = components(path);
    let mut prefix = String::with_capacity(path.len());

    for (i, comp) in comps.iter().enumerate() {
        if i > 0 {
            prefix.push('/');
        }
        prefix.push_str(comp);
        let is_last = i + 1 == comps.len();

        let kind = classify(fs, &prefix);
        trace!(fs = %fs.uri(), path = %prefix, %kind, "lstat component");

        match kind {
            EntryKind::Absent => {
                debug!(fs = %fs.uri(), path, missing = %prefix, "deleted: component absent");
                return true;
            }
            EntryKind::Inaccessible => {
                debug!(fs = %fs.uri(), path, at = %prefix, "not deleted: existence indeterminate");
                return false;
            }
            EntryKind::Dir => {}
            _ if is_last => {}
            other => {
                debug!(
                    fs = %fs.uri(),
                    path,
                    at = %prefix,
                    kind = %other,
                    "deleted: path continues through a non-directory"
                );
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FakeFilesystem;

    fn fixture() -> FakeFilesystem {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("dir", 0o755).unwrap();
        for f in ["file", "dir/file"] {
            fs.create(f).unwrap();
        }
        fs.symlink("dir", "linkToDir").unwrap();
        fs.symlink("file", "linkToFile").unwrap();
        fs.symlink("del", "linkToDel").unwrap();
        fs
    }

    #[test]
    fn missing_leaf_is_deleted() {
        let fs = fixture();
        assert!(is_deleted(&fs, "del"));
        assert!(is_deleted(&fs, "dir/del"));
        assert!(is_deleted(&fs, "del/del/del"));
    }

    #[test]
    fn existing_leaf_of_any_kind_is_not_deleted() {
        let fs = fixture();
        for p in ["file", "dir", "dir/file", "linkToDir", "linkToFile", "linkToDel"] {
            assert!(!is_deleted(&fs, p), "{p} should not be deleted");
        }
    }

    #[test]
    fn traversal_through_non_directory_is_deleted() {
        let fs = fixture();
        assert!(is_deleted(&fs, "linkToDir/file"));
        assert!(is_deleted(&fs, "file/behindFile"));
        assert!(is_deleted(&fs, "linkToFile/x"));
    }

    #[test]
    fn inaccessible_is_never_deleted() {
        let fs = fixture();
        fs.mkdir_all("inacc", 0o755).unwrap();
        fs.chmod("inacc", 0o000).unwrap();
        assert!(!is_deleted(&fs, "inacc"));
        assert!(!is_deleted(&fs, "inacc/file"));
        assert!(!is_deleted(&fs, "inacc/file/deeper"));
    }

    #[test]
    fn root_and_dot_paths_are_not_deleted() {
        let fs = fixture();
        assert!(!is_deleted(&fs, ""));
        assert!(!is_deleted(&fs, "./dir/./file"));
    }
}
