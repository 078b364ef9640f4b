//! Git reference management.

use crate::{ObjectId, Result, StorageError};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A git reference (branch, tag, or symbolic ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct reference to an object.
    Direct(ObjectId),
    /// Symbolic reference (e.g., HEAD -> refs/heads/main).
    Symbolic(String),
}

impl Reference {
    /// Returns the object ID if this is a direct reference.
    pub fn as_direct(&self) -> Option<ObjectId> {
        match self {
            Self::Direct(id) => Some(*id),
            Self::Symbolic(_) => None,
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Direct(id) => format!("{}\n", id),
            Self::Symbolic(target) => format!("ref: {}\n", target),
        }
    }

    fn decode(name: &str, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.strip_prefix("ref: ") {
            Some(target) => Ok(Self::Symbolic(target.to_string())),
            None => ObjectId::from_hex(raw)
                .map(Self::Direct)
                .map_err(|_| StorageError::InvalidRef(format!("{name}: {raw}"))),
        }
    }
}

/// Thread-safe reference store, optionally mirrored to a `.git` directory.
#[derive(Debug, Default)]
pub struct RefStore {
    refs: RwLock<BTreeMap<String, Reference>>,
    git_dir: Option<PathBuf>,
}

impl RefStore {
    /// Creates a new empty in-memory reference store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the references stored under a `.git` directory.
    pub fn open(git_dir: impl Into<PathBuf>) -> Result<Self> {
        let git_dir = git_dir.into();
        let mut refs = BTreeMap::new();

        match fs::read_to_string(git_dir.join("HEAD")) {
            Ok(raw) => {
                refs.insert("HEAD".to_string(), Reference::decode("HEAD", &raw)?);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let refs_dir = git_dir.join("refs");
        if refs_dir.exists() {
            for entry in walkdir::WalkDir::new(&refs_dir) {
                let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let name = ref_name(&git_dir, entry.path())?;
                let raw = fs::read_to_string(entry.path())?;
                refs.insert(name.clone(), Reference::decode(&name, &raw)?);
            }
        }

        Ok(Self {
            refs: RwLock::new(refs),
            git_dir: Some(git_dir),
        })
    }

    /// Gets a reference by name.
    pub fn get(&self, name: &str) -> Result<Reference> {
        self.refs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::RefNotFound(name.to_string()))
    }

    /// Returns true if the reference exists.
    pub fn contains(&self, name: &str) -> bool {
        self.refs.read().contains_key(name)
    }

    /// Returns an existing reference that cannot coexist with `name`.
    ///
    /// Refs are files under `.git`, so `refs/tags/rel` and `refs/tags/rel/1`
    /// would need the same path as both a file and a directory.
    pub fn conflicting(&self, name: &str) -> Option<String> {
        let as_dir = format!("{name}/");
        self.refs
            .read()
            .keys()
            .find(|existing| {
                existing.starts_with(&as_dir)
                    || name
                        .strip_prefix(existing.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .cloned()
    }

    /// Sets a reference to point to an object.
    pub fn set(&self, name: &str, target: ObjectId) -> Result<()> {
        self.store(name, Reference::Direct(target))
    }

    /// Sets a symbolic reference.
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        self.store(name, Reference::Symbolic(target.to_string()))
    }

    fn store(&self, name: &str, reference: Reference) -> Result<()> {
        let mut refs = self.refs.write();
        if let Some(git_dir) = &self.git_dir {
            let path = git_dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, reference.encode())?;
        }
        refs.insert(name.to_string(), reference);
        Ok(())
    }

    /// Deletes a reference.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut refs = self.refs.write();
        if !refs.contains_key(name) {
            return Err(StorageError::RefNotFound(name.to_string()));
        }
        if let Some(git_dir) = &self.git_dir {
            match fs::remove_file(git_dir.join(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        refs.remove(name);
        Ok(())
    }

    /// Lists all references with a given prefix, sorted by name.
    pub fn list(&self, prefix: &str) -> Vec<(String, Reference)> {
        self.refs
            .read()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, refr)| (name.clone(), refr.clone()))
            .collect()
    }

    /// Resolves HEAD to find the current commit.
    pub fn resolve_head(&self) -> Result<ObjectId> {
        let head = self.get("HEAD")?;
        match head {
            Reference::Direct(id) => Ok(id),
            Reference::Symbolic(target) => {
                let target_ref = self.get(&target)?;
                match target_ref {
                    Reference::Direct(id) => Ok(id),
                    Reference::Symbolic(_) => Err(StorageError::InvalidRef(
                        "deeply nested symbolic refs not supported".to_string(),
                    )),
                }
            }
        }
    }

    /// Gets the current branch ref (if HEAD is symbolic).
    pub fn current_branch_ref(&self) -> Option<String> {
        match self.get("HEAD").ok()? {
            Reference::Symbolic(target) => Some(target),
            Reference::Direct(_) => None,
        }
    }
}

fn ref_name(git_dir: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(git_dir)
        .map_err(|_| StorageError::InvalidRef(path.display().to_string()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Validates a short tag or branch name against git's ref-format rules.
pub fn validate_ref_name(name: &str) -> Result<()> {
    let invalid = |why: &str| StorageError::InvalidRef(format!("{name:?}: {why}"));
    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("bad leading or trailing character"));
    }
    if name.ends_with(".lock") || name.ends_with('.') {
        return Err(invalid("bad suffix"));
    }
    if name.contains("..") || name.contains("//") || name.contains("@{") {
        return Err(invalid("forbidden sequence"));
    }
    if name
        .split('/')
        .any(|component| component.starts_with('.'))
    {
        return Err(invalid("component starts with '.'"));
    }
    if name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || "~^:?*[\\".contains(c))
    {
        return Err(invalid("forbidden character"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_store_basic() {
        let store = RefStore::new();
        let id = ObjectId::from_hex("a94a8fe5ccb19ba61c4c0873d391e987982fbbd3").unwrap();

        store.set("refs/heads/main", id).unwrap();
        store.set_symbolic("HEAD", "refs/heads/main").unwrap();

        assert_eq!(
            store.current_branch_ref(),
            Some("refs/heads/main".to_string())
        );
        assert_eq!(store.resolve_head().unwrap(), id);
    }

    #[test]
    fn test_ref_listing() {
        let store = RefStore::new();
        let id = ObjectId::from_bytes([1u8; 20]);

        store.set("refs/heads/main", id).unwrap();
        store.set("refs/tags/v1.0", id).unwrap();
        store.set("refs/tags/v2.0", id).unwrap();

        let tags = store.list("refs/tags/");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].0, "refs/tags/v1.0");
    }

    #[test]
    fn test_ref_store_delete_not_found() {
        let store = RefStore::new();
        let result = store.delete("refs/tags/nonexistent");
        assert!(matches!(result, Err(StorageError::RefNotFound(_))));
    }

    #[test]
    fn test_resolve_head_dangling_symbolic() {
        let store = RefStore::new();
        store.set_symbolic("HEAD", "refs/heads/main").unwrap();
        assert!(matches!(
            store.resolve_head(),
            Err(StorageError::RefNotFound(_))
        ));
    }

    #[test]
    fn test_refs_persist_to_git_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let id = ObjectId::from_bytes([5u8; 20]);
        {
            let store = RefStore::open(tmp.path()).unwrap();
            store.set_symbolic("HEAD", "refs/heads/main").unwrap();
            store.set("refs/heads/main", id).unwrap();
            store.set("refs/tags/good", id).unwrap();
            store.set("refs/tags/gone", id).unwrap();
            store.delete("refs/tags/gone").unwrap();
        }

        let head = std::fs::read_to_string(tmp.path().join("HEAD")).unwrap();
        assert_eq!(head, "ref: refs/heads/main\n");

        let reopened = RefStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.resolve_head().unwrap(), id);
        assert_eq!(reopened.get("refs/tags/good").unwrap().as_direct(), Some(id));
        assert!(!reopened.contains("refs/tags/gone"));
    }

    #[test]
    fn test_conflicting_nested_refs() {
        let store = RefStore::new();
        let id = ObjectId::from_bytes([7u8; 20]);
        store.set("refs/tags/rel", id).unwrap();
        store.set("refs/tags/v1/final", id).unwrap();

        assert_eq!(
            store.conflicting("refs/tags/rel/1"),
            Some("refs/tags/rel".to_string())
        );
        assert_eq!(
            store.conflicting("refs/tags/v1"),
            Some("refs/tags/v1/final".to_string())
        );
        assert_eq!(store.conflicting("refs/tags/release"), None);
        assert_eq!(store.conflicting("refs/tags/v1-final"), None);
    }

    #[test]
    fn test_validate_ref_name() {
        assert!(validate_ref_name("v1.0").is_ok());
        assert!(validate_ref_name("known-good/2024").is_ok());
        for bad in ["", "-x", "a..b", "a b", "x.lock", ".hidden", "a~1", "a:b", "a/"] {
            assert!(validate_ref_name(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
