//! Store index - the cached list of entries in a password store
//!
//! A `pass` store is a directory tree of `<name>.gpg` files. The entry name is
//! the path relative to the store root with the suffix stripped
//! (`work/github.gpg` -> `work/github`). Dotfiles and dot-directories
//! (`.gpg-id`, `.git`, `.extensions`, ...) are store metadata and skipped.

use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::StoreAccessError;

/// File suffix of an encrypted entry
pub const ENTRY_SUFFIX: &str = "gpg";

/// One addressable item in the store, e.g. `work/github`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Entry(String);

impl Entry {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Entry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Entry {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// An immutable, complete listing of the store
pub type Snapshot = Arc<Vec<Entry>>;

/// Lazily built, explicitly refreshed listing of a password store.
///
/// Readers always get a whole snapshot; a rescan builds the new list off to
/// the side and swaps it in.
pub struct StoreIndex {
    root: PathBuf,
    snapshot: RwLock<Option<Snapshot>>,
}

impl StoreIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snapshot: RwLock::new(None),
        }
    }

    /// All entries, sorted. Scans the store on first use.
    ///
    /// A failed scan is not cached, so a store that appears later is picked
    /// up by the next call.
    pub fn list(&self) -> Result<Snapshot, StoreAccessError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        let scanned = Arc::new(scan(&self.root)?);
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        // Another reader may have won the race; keep whichever landed first.
        Ok(slot.get_or_insert(scanned).clone())
    }

    /// Drop the cached listing and rescan now
    pub fn refresh(&self) -> Result<Snapshot, StoreAccessError> {
        match scan(&self.root) {
            Ok(entries) => {
                let snapshot = Arc::new(entries);
                *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(e) => {
                *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = None;
                Err(e)
            }
        }
    }

    /// Whether `entry` is in the current listing
    pub fn contains(&self, entry: &Entry) -> Result<bool, StoreAccessError> {
        Ok(self.list()?.binary_search(entry).is_ok())
    }

    fn current(&self) -> Option<Snapshot> {
        self.snapshot.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Walk the store and collect entry names
fn scan(root: &Path) -> Result<Vec<Entry>, StoreAccessError> {
    let metadata = fs::metadata(root).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreAccessError::Missing(root.to_path_buf()),
        _ => StoreAccessError::Unreadable {
            path: root.to_path_buf(),
            source,
        },
    })?;
    if !metadata.is_dir() {
        return Err(StoreAccessError::NotADirectory(root.to_path_buf()));
    }
    fs::read_dir(root).map_err(|source| StoreAccessError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                warn!("Skipping unreadable part of password store: {}", e);
                continue;
            }
        };

        if !item.file_type().is_file() || item.path().extension() != Some(OsStr::new(ENTRY_SUFFIX)) {
            continue;
        }

        let Ok(relative) = item.path().strip_prefix(root) else {
            continue;
        };
        match entry_name(relative) {
            Some(name) => entries.push(Entry::new(name)),
            None => warn!("Skipping entry with non UTF-8 name: {:?}", relative),
        }
    }

    entries.sort();
    entries.dedup();

    info!("Loaded {} passwords from {}", entries.len(), root.display());
    Ok(entries)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// `work/github.gpg` -> `work/github`, always `/`-separated
fn entry_name(relative: &Path) -> Option<String> {
    let stripped = relative.with_extension("");
    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            other => {
                debug!("Unexpected path component {:?} in {:?}", other, relative);
                return None;
            }
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"-----BEGIN PGP MESSAGE-----").unwrap();
    }

    fn names(snapshot: &Snapshot) -> Vec<&str> {
        snapshot.iter().map(Entry::as_str).collect()
    }

    fn sample_store() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, ".gpg-id");
        touch(root, "email.gpg");
        touch(root, "work/github.gpg");
        touch(root, "work/.gpg-id");
        touch(root, "Work/VPN.gpg");
        touch(root, "personal/bank.de.gpg");
        touch(root, "notes.txt");
        touch(root, ".git/config");
        touch(root, ".git/objects/ab/stray.gpg");
        touch(root, ".extensions/otp.bash");
        temp
    }

    #[test]
    fn test_list_excludes_metadata() {
        let store = sample_store();
        let index = StoreIndex::new(store.path());

        let snapshot = index.list().unwrap();
        assert_eq!(
            names(&snapshot),
            vec!["Work/VPN", "email", "personal/bank.de", "work/github"]
        );
    }

    #[test]
    fn test_list_is_cached_until_refresh() {
        let store = sample_store();
        let index = StoreIndex::new(store.path());

        let first = index.list().unwrap();
        touch(store.path(), "new/entry.gpg");

        let second = index.list().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!names(&second).contains(&"new/entry"));

        let refreshed = index.refresh().unwrap();
        assert!(names(&refreshed).contains(&"new/entry"));
        assert!(Arc::ptr_eq(&refreshed, &index.list().unwrap()));

        // The old snapshot is untouched by the rescan
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_readers_see_whole_snapshots_during_refresh() {
        let store = sample_store();
        let index = StoreIndex::new(store.path());
        let base = index.list().unwrap();
        let extra = store.path().join("zz/extra.gpg");

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for round in 0..200 {
                    if round % 2 == 0 {
                        touch(store.path(), "zz/extra.gpg");
                    } else {
                        fs::remove_file(&extra).unwrap();
                    }
                    index.refresh().unwrap();
                }
            });

            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..2000 {
                        let snapshot = index.list().unwrap();
                        let names = names(&snapshot);
                        match names.len() {
                            4 => assert_eq!(snapshot.as_slice(), base.as_slice()),
                            5 => {
                                assert_eq!(&snapshot[..4], base.as_slice());
                                assert_eq!(names[4], "zz/extra");
                            }
                            n => panic!("partial snapshot of {} entries: {:?}", n, names),
                        }
                        assert!(index.contains(&Entry::from("work/github")).unwrap());
                    }
                });
            }
        });
    }

    #[test]
    fn test_missing_store() {
        let temp = TempDir::new().unwrap();
        let index = StoreIndex::new(temp.path().join("nope"));

        let err = index.list().unwrap_err();
        assert!(matches!(err, StoreAccessError::Missing(_)));

        // A store created later is picked up without an explicit refresh
        touch(&temp.path().join("nope"), "late.gpg");
        assert_eq!(names(&index.list().unwrap()), vec!["late"]);
    }

    #[test]
    fn test_store_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("store");
        fs::write(&file, "").unwrap();

        let err = StoreIndex::new(&file).list().unwrap_err();
        assert!(matches!(err, StoreAccessError::NotADirectory(_)));
    }

    #[test]
    fn test_failed_refresh_invalidates() {
        let store = sample_store();
        let root = store.path().to_path_buf();
        let index = StoreIndex::new(&root);
        index.list().unwrap();

        drop(store);
        assert!(index.refresh().is_err());
        assert!(index.list().is_err());
    }

    #[test]
    fn test_hidden_store_root_is_walked() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".password-store");
        touch(&root, "site.gpg");

        assert_eq!(names(&StoreIndex::new(&root).list().unwrap()), vec!["site"]);
    }

    #[test]
    fn test_contains() {
        let store = sample_store();
        let index = StoreIndex::new(store.path());
        assert!(index.contains(&Entry::from("work/github")).unwrap());
        assert!(!index.contains(&Entry::from("work")).unwrap());
    }

    #[test]
    fn test_entry_name() {
        assert_eq!(entry_name(Path::new("a/b/c.gpg")).as_deref(), Some("a/b/c"));
        assert_eq!(entry_name(Path::new("dotted.name.gpg")).as_deref(), Some("dotted.name"));
    }
}
