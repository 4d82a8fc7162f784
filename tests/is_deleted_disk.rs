//! Deletion checks against a real directory tree.

use assert_fs::TempDir;
use syncfs_util::{BasicFilesystem, Filesystem, is_deleted};

fn fixture() -> (TempDir, BasicFilesystem) {
    let td = TempDir::new().expect("tempdir");
    let fs = BasicFilesystem::new(td.path());
    fs.mkdir_all("dir", 0o777).expect("mkdir dir");
    for f in ["file", "del.file", "dir.file", "dir/file"] {
        fs.create(f).expect("create fixture file");
    }
    (td, fs)
}

#[test]
fn plain_files_and_dirs() {
    let (_td, fs) = fixture();
    let cases = [
        ("del", true),
        ("del.file", false),
        ("del/del", true),
        ("file", false),
        ("file/behindFile", true),
        ("dir", false),
        ("dir.file", false),
        ("dir/file", false),
        ("dir/del", true),
        ("dir/del/del", true),
        ("del/del/del", true),
    ];
    for (path, expected) in cases {
        assert_eq!(is_deleted(&fs, path), expected, "is_deleted({path})");
    }
}

#[cfg(unix)]
#[test]
fn symlinks_are_leaves_never_directories() {
    let (_td, fs) = fixture();
    for (target, link) in [("dir", "linkToDir"), ("file", "linkToFile"), ("del", "linkToDel")] {
        fs.symlink(target, link).expect("symlink");
    }

    let cases = [
        ("linkToFile", false),
        ("linkToDel", false),
        ("linkToDir", false),
        ("linkToDir/file", true),
        ("linkToDir/del", true),
    ];
    for (path, expected) in cases {
        assert_eq!(is_deleted(&fs, path), expected, "is_deleted({path})");
    }

    // The OS itself would happily resolve the path through the link.
    assert!(fs.stat("linkToDir/file").is_ok());
}

#[cfg(unix)]
#[test]
fn inaccessible_directory_is_not_deleted() {
    let (_td, fs) = fixture();
    fs.mkdir_all("inacc", 0o777).unwrap();
    fs.create("inacc/file").unwrap();
    fs.chmod("inacc", 0o000).unwrap();

    // Root bypasses permission checks; nothing to test then.
    let denied = fs.lstat("inacc/file").is_err_and(|e| e.is_permission());
    if denied {
        assert!(!is_deleted(&fs, "inacc"));
        assert!(!is_deleted(&fs, "inacc/file"));
        assert!(!is_deleted(&fs, "inacc/missing"));
    } else {
        eprintln!("skipping: permission checks not enforced (running as root?)");
    }

    fs.chmod("inacc", 0o777).unwrap();
}
