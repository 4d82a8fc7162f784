//! In-memory filesystem handle.
//!
//! Behaves like a POSIX disk for the calls this crate makes: directories,
//! files and symlinks, owner permission bits (a directory without the search
//! bit hides its children behind `PermissionDenied`), and symlinks followed in
//! intermediate components. Faults can be injected to exercise failure paths
//! that are hard to provoke on a real disk.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::{EntryKind, FileId, Filesystem, FilesystemType, Metadata, WriteFile, is_cross_device};
use crate::errors::FsError;
use crate::path::components;

const MAX_LINK_DEPTH: u32 = 40;

/// Device numbers handed to new trees; clones share their tree's number.
static NEXT_DEV: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum Node {
    Dir,
    File(Vec<u8>),
    Symlink(String),
}

#[derive(Debug)]
struct Entry {
    node: Node,
    mode: u32,
    modified: SystemTime,
    ino: u64,
}

impl Entry {
    fn metadata(&self, dev: u64) -> Metadata {
        let (kind, len) = match &self.node {
            Node::Dir => (EntryKind::Dir, 0),
            Node::File(data) => (EntryKind::File, data.len() as u64),
            Node::Symlink(target) => (EntryKind::Symlink, target.len() as u64),
        };
        Metadata {
            kind,
            len,
            mode: self.mode,
            modified: self.modified,
            file_id: Some(FileId { dev, ino: self.ino }),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    /// Bytes each writer accepts before failing.
    write_limit: Option<u64>,
    fail_sync: bool,
    fail_remove: HashSet<String>,
    rename_error: Option<io::ErrorKind>,
}

/// Keys are canonical paths below the root; the root itself is `""`.
#[derive(Debug)]
struct State {
    entries: BTreeMap<String, Entry>,
    faults: Faults,
    dev: u64,
    next_ino: u64,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_key(key: &str) -> String {
    key.rsplit_once('/')
        .map(|(p, _)| p.to_string())
        .unwrap_or_default()
}

fn err(kind: io::ErrorKind, msg: &str) -> io::Error {
    io::Error::new(kind, msg.to_string())
}

impl State {
    fn new() -> Self {
        let mut st = Self {
            entries: BTreeMap::new(),
            faults: Faults::default(),
            dev: NEXT_DEV.fetch_add(1, Ordering::Relaxed),
            next_ino: 1,
        };
        let root = st.new_entry(Node::Dir, 0o755);
        st.entries.insert(String::new(), root);
        st
    }

    fn new_entry(&mut self, node: Node, mode: u32) -> Entry {
        let ino = self.next_ino;
        self.next_ino += 1;
        Entry {
            node,
            mode,
            modified: SystemTime::now(),
            ino,
        }
    }

    /// Walk `comps` from `base`, following symlinks in intermediate components
    /// (and in the last one when `follow_last`). Returns the key reached.
    fn resolve_from(
        &self,
        base: String,
        comps: &[&str],
        follow_last: bool,
        depth: u32,
    ) -> io::Result<String> {
        let mut cur = base;
        for (i, comp) in comps.iter().enumerate() {
            let last = i + 1 == comps.len();
            if *comp == ".." {
                cur = parent_key(&cur);
                continue;
            }

            let dir = self
                .entries
                .get(&cur)
                .ok_or_else(|| err(io::ErrorKind::NotFound, "no such file or directory"))?;
            if !matches!(dir.node, Node::Dir) {
                return Err(err(io::ErrorKind::NotADirectory, "not a directory"));
            }
            if dir.mode & 0o100 == 0 {
                return Err(err(io::ErrorKind::PermissionDenied, "permission denied"));
            }

            let next = join_key(&cur, comp);
            let entry = self
                .entries
                .get(&next)
                .ok_or_else(|| err(io::ErrorKind::NotFound, "no such file or directory"))?;

            if let Node::Symlink(target) = &entry.node {
                if !last || follow_last {
                    if depth >= MAX_LINK_DEPTH {
                        return Err(io::Error::other("too many levels of symbolic links"));
                    }
                    let start = if target.starts_with('/') { String::new() } else { cur };
                    cur = self.resolve_from(start, &components(target), true, depth + 1)?;
                    continue;
                }
            }
            cur = next;
        }
        Ok(cur)
    }

    fn resolve(&self, path: &str, follow_last: bool) -> io::Result<String> {
        self.resolve_from(String::new(), &components(path), follow_last, 0)
    }

    /// Resolve the parent directory of `path`; returns (parent key, final name).
    fn resolve_parent(&self, path: &str) -> io::Result<(String, String)> {
        let comps = components(path);
        let Some((name, parents)) = comps.split_last() else {
            return Err(err(io::ErrorKind::InvalidInput, "operation not valid on the root"));
        };
        if *name == ".." {
            return Err(err(io::ErrorKind::InvalidInput, "final component may not be '..'"));
        }
        let parent = self.resolve_from(String::new(), parents, true, 0)?;
        let entry = self
            .entries
            .get(&parent)
            .ok_or_else(|| err(io::ErrorKind::NotFound, "no such file or directory"))?;
        if !matches!(entry.node, Node::Dir) {
            return Err(err(io::ErrorKind::NotADirectory, "not a directory"));
        }
        Ok((parent, name.to_string()))
    }

    /// Resolve the entry `create` writes to as (parent key, key). A symlink in
    /// the final component is followed even when its target does not exist yet.
    fn resolve_for_create(&self, path: &str) -> io::Result<(String, String)> {
        let mut path = path.to_string();
        for _ in 0..MAX_LINK_DEPTH {
            let (parent, name) = self.resolve_parent(&path)?;
            let key = join_key(&parent, &name);
            match self.entries.get(&key).map(|e| &e.node) {
                Some(Node::Symlink(target)) if target.starts_with('/') => path = target.clone(),
                Some(Node::Symlink(target)) => path = join_key(&parent, target),
                _ => return Ok((parent, key)),
            }
        }
        Err(io::Error::other("too many levels of symbolic links"))
    }

    fn require_writable_dir(&self, key: &str) -> io::Result<()> {
        match self.entries.get(key) {
            Some(e) if e.mode & 0o300 == 0o300 => Ok(()),
            Some(_) => Err(err(io::ErrorKind::PermissionDenied, "permission denied")),
            None => Err(err(io::ErrorKind::NotFound, "no such file or directory")),
        }
    }
}

/// In-memory [`Filesystem`]. Cloning yields another handle to the same tree,
/// but a distinct handle for [`same_filesystem`](super::same_filesystem).
#[derive(Debug, Clone)]
pub struct FakeFilesystem {
    name: String,
    state: Arc<Mutex<State>>,
}

impl Default for FakeFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeFilesystem {
    pub fn new() -> Self {
        Self::with_uri("fake")
    }

    pub fn with_uri(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(State::new())),
        }
    }

    /// Writers fail once each has accepted `n` bytes.
    pub fn fail_writes_after(&self, n: u64) {
        lock(&self.state).faults.write_limit = Some(n);
    }

    /// Make `sync_all` on writers fail.
    pub fn fail_sync(&self, on: bool) {
        lock(&self.state).faults.fail_sync = on;
    }

    /// Make `remove(path)` fail with `PermissionDenied`.
    pub fn fail_remove(&self, path: &str) {
        lock(&self.state)
            .faults
            .fail_remove
            .insert(components(path).join("/"));
    }

    /// Make the next rename fail with an error of `kind`.
    pub fn fail_rename_with(&self, kind: io::ErrorKind) {
        lock(&self.state).faults.rename_error = Some(kind);
    }

    pub fn clear_faults(&self) {
        lock(&self.state).faults = Faults::default();
    }
}

impl Filesystem for FakeFilesystem {
    fn lstat(&self, path: &str) -> Result<Metadata, FsError> {
        let st = lock(&self.state);
        st.resolve(path, false)
            .map(|key| st.entries[&key].metadata(st.dev))
            .map_err(|e| FsError::from_io("lstat", path, e))
    }

    fn stat(&self, path: &str) -> Result<Metadata, FsError> {
        let st = lock(&self.state);
        st.resolve(path, true)
            .map(|key| st.entries[&key].metadata(st.dev))
            .map_err(|e| FsError::from_io("stat", path, e))
    }

    fn open(&self, path: &str) -> Result<Box<dyn Read + Send>, FsError> {
        let st = lock(&self.state);
        let res = st.resolve(path, true).and_then(|key| {
            let entry = &st.entries[&key];
            match &entry.node {
                Node::File(_) if entry.mode & 0o400 == 0 => {
                    Err(err(io::ErrorKind::PermissionDenied, "permission denied"))
                }
                Node::File(data) => Ok(data.clone()),
                _ => Err(err(io::ErrorKind::IsADirectory, "is a directory")),
            }
        });
        let data = res.map_err(|e| FsError::from_io("open", path, e))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(&self, path: &str) -> Result<Box<dyn WriteFile>, FsError> {
        let mut st = lock(&self.state);
        let res = (|| -> io::Result<String> {
            let (parent, key) = st.resolve_for_create(path)?;
            match st.entries.get_mut(&key) {
                Some(entry) => match entry.node {
                    Node::Dir => Err(err(io::ErrorKind::IsADirectory, "is a directory")),
                    _ if entry.mode & 0o200 == 0 => {
                        Err(err(io::ErrorKind::PermissionDenied, "permission denied"))
                    }
                    _ => {
                        entry.node = Node::File(Vec::new());
                        entry.modified = SystemTime::now();
                        Ok(key)
                    }
                },
                None => {
                    st.require_writable_dir(&parent)?;
                    let entry = st.new_entry(Node::File(Vec::new()), 0o644);
                    st.entries.insert(key.clone(), entry);
                    Ok(key)
                }
            }
        })();
        let key = res.map_err(|e| FsError::from_io("create", path, e))?;
        Ok(Box::new(FakeFile {
            state: Arc::clone(&self.state),
            key,
            written: 0,
        }))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        if let Some(kind) = st.faults.rename_error.take() {
            let e = err(kind, "simulated rename failure");
            return Err(if is_cross_device(&e) {
                FsError::cross_device("rename", from, e)
            } else {
                FsError::from_io("rename", from, e)
            });
        }

        let res = (|| -> io::Result<()> {
            let (fparent, fname) = st.resolve_parent(from)?;
            let fkey = join_key(&fparent, &fname);
            if !st.entries.contains_key(&fkey) {
                return Err(err(io::ErrorKind::NotFound, "no such file or directory"));
            }
            let (tparent, tname) = st.resolve_parent(to)?;
            let tkey = join_key(&tparent, &tname);
            st.require_writable_dir(&fparent)?;
            st.require_writable_dir(&tparent)?;
            if fkey == tkey {
                return Ok(());
            }
            if tkey.starts_with(&format!("{fkey}/")) {
                return Err(err(io::ErrorKind::InvalidInput, "cannot move a directory into itself"));
            }
            if let Some(existing) = st.entries.get(&tkey) {
                if matches!(existing.node, Node::Dir) {
                    return Err(err(io::ErrorKind::IsADirectory, "destination is a directory"));
                }
                st.entries.remove(&tkey);
            }

            let prefix = format!("{fkey}/");
            let moved: Vec<String> = st
                .entries
                .keys()
                .filter(|k| **k == fkey || k.starts_with(&prefix))
                .cloned()
                .collect();
            for old in moved {
                if let Some(entry) = st.entries.remove(&old) {
                    let new = format!("{tkey}{}", &old[fkey.len()..]);
                    st.entries.insert(new, entry);
                }
            }
            Ok(())
        })();
        res.map_err(|e| FsError::from_io("rename", from, e))
    }

    fn remove(&self, path: &str) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        let res = (|| -> io::Result<()> {
            let (parent, name) = st.resolve_parent(path)?;
            let key = join_key(&parent, &name);
            if !st.entries.contains_key(&key) {
                return Err(err(io::ErrorKind::NotFound, "no such file or directory"));
            }
            st.require_writable_dir(&parent)?;
            if st.faults.fail_remove.contains(&key) {
                return Err(err(io::ErrorKind::PermissionDenied, "simulated remove failure"));
            }
            let prefix = format!("{key}/");
            if st.entries.keys().any(|k| k.starts_with(&prefix)) {
                return Err(err(io::ErrorKind::DirectoryNotEmpty, "directory not empty"));
            }
            st.entries.remove(&key);
            Ok(())
        })();
        res.map_err(|e| FsError::from_io("remove", path, e))
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        let res = (|| -> io::Result<()> {
            let mut cur = String::new();
            for comp in components(path) {
                let next = st.resolve_from(cur.clone(), &[comp], true, 0);
                match next {
                    Ok(key) => {
                        if !matches!(st.entries[&key].node, Node::Dir) {
                            return Err(err(io::ErrorKind::NotADirectory, "not a directory"));
                        }
                        cur = key;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        st.require_writable_dir(&cur)?;
                        let key = join_key(&cur, comp);
                        let entry = st.new_entry(Node::Dir, mode & 0o7777);
                        st.entries.insert(key.clone(), entry);
                        cur = key;
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        })();
        res.map_err(|e| FsError::from_io("mkdir", path, e))
    }

    fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        let key = st
            .resolve(path, true)
            .map_err(|e| FsError::from_io("chmod", path, e))?;
        if let Some(entry) = st.entries.get_mut(&key) {
            entry.mode = mode & 0o7777;
        }
        Ok(())
    }

    fn chtimes(&self, path: &str, modified: SystemTime) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        let key = st
            .resolve(path, true)
            .map_err(|e| FsError::from_io("chtimes", path, e))?;
        if let Some(entry) = st.entries.get_mut(&key) {
            entry.modified = modified;
        }
        Ok(())
    }

    fn symlink(&self, target: &str, link: &str) -> Result<(), FsError> {
        let mut st = lock(&self.state);
        let res = (|| -> io::Result<()> {
            let (parent, name) = st.resolve_parent(link)?;
            let key = join_key(&parent, &name);
            if st.entries.contains_key(&key) {
                return Err(err(io::ErrorKind::AlreadyExists, "file exists"));
            }
            st.require_writable_dir(&parent)?;
            let target = target.replace('\\', "/");
            let entry = st.new_entry(Node::Symlink(target), 0o777);
            st.entries.insert(key, entry);
            Ok(())
        })();
        res.map_err(|e| FsError::from_io("symlink", link, e))
    }

    fn uri(&self) -> String {
        format!("fake://{}", self.name)
    }

    fn fs_type(&self) -> FilesystemType {
        FilesystemType::Fake
    }
}

/// Writer handed out by [`FakeFilesystem::create`]; bytes land in the tree as
/// they are written.
struct FakeFile {
    state: Arc<Mutex<State>>,
    key: String,
    written: u64,
}

impl Write for FakeFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut st = lock(&self.state);
        let allowed = match st.faults.write_limit {
            Some(limit) => limit.saturating_sub(self.written).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        if allowed == 0 && !buf.is_empty() {
            return Err(err(io::ErrorKind::StorageFull, "simulated write failure"));
        }
        let entry = st
            .entries
            .get_mut(&self.key)
            .ok_or_else(|| err(io::ErrorKind::NotFound, "file removed while open"))?;
        match &mut entry.node {
            Node::File(data) => data.extend_from_slice(&buf[..allowed]),
            _ => return Err(err(io::ErrorKind::InvalidInput, "not a regular file")),
        }
        entry.modified = SystemTime::now();
        self.written += allowed as u64;
        Ok(allowed)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteFile for FakeFile {
    fn sync_all(&mut self) -> io::Result<()> {
        if lock(&self.state).faults.fail_sync {
            Err(io::Error::other("simulated sync failure"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(fs: &FakeFilesystem, path: &str, data: &[u8]) {
        let mut w = fs.create(path).unwrap();
        w.write_all(data).unwrap();
        w.sync_all().unwrap();
    }

    fn read(fs: &FakeFilesystem, path: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        fs.open(path).unwrap().read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn files_round_trip_and_truncate() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("a/b", 0o755).unwrap();
        write(&fs, "a/b/f", b"first version");
        write(&fs, "a/b/f", b"second");
        assert_eq!(read(&fs, "a/b/f"), b"second");
        assert_eq!(fs.lstat("a/b/f").unwrap().len, 6);
    }

    #[test]
    fn intermediate_symlinks_are_followed_final_is_not() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("dir", 0o755).unwrap();
        write(&fs, "dir/file", b"x");
        fs.symlink("dir", "link").unwrap();
        assert_eq!(fs.lstat("link").unwrap().kind, EntryKind::Symlink);
        assert_eq!(fs.stat("link").unwrap().kind, EntryKind::Dir);
        assert_eq!(fs.lstat("link/file").unwrap().kind, EntryKind::File);
    }

    #[test]
    fn dangling_symlink_lstat_ok_stat_missing() {
        let fs = FakeFilesystem::new();
        fs.symlink("nowhere", "dangling").unwrap();
        assert!(fs.lstat("dangling").is_ok());
        assert!(fs.stat("dangling").unwrap_err().is_not_found());
    }

    #[test]
    fn create_through_dangling_symlink_creates_target() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("dir", 0o755).unwrap();
        fs.symlink("dir/target", "link").unwrap();
        write(&fs, "link", b"via link");
        assert_eq!(fs.lstat("link").unwrap().kind, EntryKind::Symlink);
        assert_eq!(read(&fs, "dir/target"), b"via link");
    }

    #[test]
    fn identity_survives_rename_and_differs_between_trees() {
        let fs = FakeFilesystem::new();
        write(&fs, "f", b"x");
        let before = fs.lstat("f").unwrap();
        fs.rename("f", "g").unwrap();
        let after = fs.lstat("g").unwrap();
        assert!(before.same_file(&after));

        let other = FakeFilesystem::new();
        write(&other, "g", b"x");
        assert!(!after.same_file(&other.lstat("g").unwrap()));
        assert!(after.same_file(&fs.clone().lstat("g").unwrap()));
    }

    #[test]
    fn symlink_cycle_is_an_error_not_a_hang() {
        let fs = FakeFilesystem::new();
        fs.symlink("b", "a").unwrap();
        fs.symlink("a", "b").unwrap();
        let e = fs.stat("a").unwrap_err();
        assert!(!e.is_not_found());
    }

    #[test]
    fn unsearchable_dir_hides_children() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("inacc", 0o755).unwrap();
        write(&fs, "inacc/file", b"x");
        fs.chmod("inacc", 0o000).unwrap();
        assert!(fs.lstat("inacc/file").unwrap_err().is_permission());
        assert!(fs.lstat("inacc/missing").unwrap_err().is_permission());
    }

    #[test]
    fn rename_moves_subtree() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("src/sub", 0o755).unwrap();
        write(&fs, "src/sub/f", b"data");
        fs.rename("src", "dst").unwrap();
        assert!(fs.lstat("src").unwrap_err().is_not_found());
        assert_eq!(read(&fs, "dst/sub/f"), b"data");
    }

    #[test]
    fn remove_refuses_non_empty_dir() {
        let fs = FakeFilesystem::new();
        fs.mkdir_all("d", 0o755).unwrap();
        write(&fs, "d/f", b"");
        let e = fs.remove("d").unwrap_err();
        assert_eq!(e.io_error().kind(), io::ErrorKind::DirectoryNotEmpty);
        fs.remove("d/f").unwrap();
        fs.remove("d").unwrap();
    }

    #[test]
    fn injected_write_limit_fails_mid_stream() {
        let fs = FakeFilesystem::new();
        fs.fail_writes_after(4);
        let mut w = fs.create("f").unwrap();
        let e = w.write_all(b"0123456789").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::StorageFull);
        drop(w);
        assert_eq!(read(&fs, "f"), b"0123");
    }

    #[test]
    fn injected_rename_error_classified() {
        let fs = FakeFilesystem::new();
        write(&fs, "f", b"");
        fs.fail_rename_with(io::ErrorKind::CrossesDevices);
        assert!(fs.rename("f", "g").unwrap_err().is_cross_device());
        fs.fail_rename_with(io::ErrorKind::PermissionDenied);
        assert!(fs.rename("f", "g").unwrap_err().is_permission());
        fs.clear_faults();
        fs.rename("f", "g").unwrap();
    }

    #[test]
    fn injected_remove_failure() {
        let fs = FakeFilesystem::new();
        write(&fs, "keep", b"");
        fs.fail_remove("./keep");
        assert!(fs.remove("keep").unwrap_err().is_permission());
    }
}
