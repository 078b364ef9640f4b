//! Working tree backends.
//!
//! The working tree is the materialized set of files for the checked-out
//! state. On disk it is a plain directory next to `.git`; in memory it is a
//! sorted map of paths to contents.

use crate::{Result, StorageError};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the metadata directory excluded from the working tree.
pub const GIT_DIR: &str = ".git";

/// A working tree rooted on disk or held in memory.
#[derive(Debug)]
pub enum WorkTree {
    /// Files live under `root`.
    Disk {
        /// Repository root directory.
        root: PathBuf,
    },
    /// Files live in a map keyed by relative path.
    Memory {
        /// File contents.
        files: RwLock<BTreeMap<String, Bytes>>,
    },
}

impl WorkTree {
    /// Creates a disk working tree.
    pub fn disk(root: impl Into<PathBuf>) -> Self {
        Self::Disk { root: root.into() }
    }

    /// Creates an empty in-memory working tree.
    pub fn memory() -> Self {
        Self::Memory {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Writes a file, creating parent directories as needed.
    pub fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        validate_path(path)?;
        match self {
            Self::Disk { root } => {
                let full = root.join(path);
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(full, data)?;
            }
            Self::Memory { files } => {
                files
                    .write()
                    .insert(path.to_string(), Bytes::copy_from_slice(data));
            }
        }
        Ok(())
    }

    /// Reads a file.
    pub fn read(&self, path: &str) -> Result<Bytes> {
        validate_path(path)?;
        match self {
            Self::Disk { root } => match fs::read(root.join(path)) {
                Ok(data) => Ok(Bytes::from(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(StorageError::NotFound(path.to_string()))
                }
                Err(e) => Err(e.into()),
            },
            Self::Memory { files } => files
                .read()
                .get(path)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(path.to_string())),
        }
    }

    /// Returns true if the file exists.
    pub fn exists(&self, path: &str) -> bool {
        if validate_path(path).is_err() {
            return false;
        }
        match self {
            Self::Disk { root } => root.join(path).is_file(),
            Self::Memory { files } => files.read().contains_key(path),
        }
    }

    /// Removes a file.
    pub fn remove(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        match self {
            Self::Disk { root } => match fs::remove_file(root.join(path)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Err(StorageError::NotFound(path.to_string()))
                }
                Err(e) => Err(e.into()),
            },
            Self::Memory { files } => files
                .write()
                .remove(path)
                .map(|_| ())
                .ok_or_else(|| StorageError::NotFound(path.to_string())),
        }
    }

    /// Creates a directory. Directories are implicit in memory.
    pub fn create_dir(&self, path: &str) -> Result<()> {
        validate_path(path)?;
        if let Self::Disk { root } = self {
            fs::create_dir_all(root.join(path))?;
        }
        Ok(())
    }

    /// Reads every file in the working tree.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Bytes>> {
        match self {
            Self::Disk { root } => {
                let mut files = BTreeMap::new();
                let walker = walkdir::WalkDir::new(root)
                    .into_iter()
                    .filter_entry(|e| e.file_name() != GIT_DIR);
                for entry in walker {
                    let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let path = relative_path(root, entry.path())?;
                    files.insert(path, Bytes::from(fs::read(entry.path())?));
                }
                Ok(files)
            }
            Self::Memory { files } => Ok(files.read().clone()),
        }
    }

    /// Replaces the whole working tree with `files`.
    pub fn checkout(&self, files: &BTreeMap<String, Bytes>) -> Result<()> {
        match self {
            Self::Disk { root } => {
                for existing in self.snapshot()?.keys() {
                    if !files.contains_key(existing) {
                        fs::remove_file(root.join(existing))?;
                    }
                }
                for (path, data) in files {
                    self.write(path, data)?;
                }
                Ok(())
            }
            Self::Memory { files: current } => {
                for path in files.keys() {
                    validate_path(path)?;
                }
                *current.write() = files.clone();
                Ok(())
            }
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| StorageError::InvalidPath(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Checks that a path is relative, `/`-separated and stays inside the tree.
pub fn validate_path(path: &str) -> Result<()> {
    let invalid = || StorageError::InvalidPath(path.to_string());
    if path.is_empty() || path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(invalid());
    }
    for (i, segment) in path.split('/').enumerate() {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid());
        }
        if i == 0 && segment == GIT_DIR {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(tree: &WorkTree) {
        tree.write("k8s-policies/ns1/a.yaml", b"a").unwrap();
        tree.write("antrea-tiers/t.yaml", b"t").unwrap();
        assert!(tree.exists("k8s-policies/ns1/a.yaml"));
        assert_eq!(tree.read("antrea-tiers/t.yaml").unwrap().as_ref(), b"t");

        let snapshot = tree.snapshot().unwrap();
        assert_eq!(
            snapshot.keys().cloned().collect::<Vec<_>>(),
            vec!["antrea-tiers/t.yaml", "k8s-policies/ns1/a.yaml"]
        );

        tree.remove("antrea-tiers/t.yaml").unwrap();
        assert!(matches!(
            tree.remove("antrea-tiers/t.yaml"),
            Err(StorageError::NotFound(_))
        ));

        let mut target = BTreeMap::new();
        target.insert("antrea-policies/ns2/c.yaml".to_string(), Bytes::from("c"));
        tree.checkout(&target).unwrap();
        assert_eq!(tree.snapshot().unwrap(), target);
    }

    #[test]
    fn test_memory_worktree() {
        exercise(&WorkTree::memory());
    }

    #[test]
    fn test_disk_worktree_skips_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join(".git/objects")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        let tree = WorkTree::disk(tmp.path());
        exercise(&tree);
        assert!(tmp.path().join(".git/HEAD").exists());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("k8s-policies/ns/a.yaml").is_ok());
        for bad in ["", "/abs", "a/../b", "a//b", ".git/HEAD", "./a", "a\\b"] {
            assert!(validate_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
