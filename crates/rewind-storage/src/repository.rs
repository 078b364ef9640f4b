//! The versioned store: object database, refs, index and working tree.

use crate::diff::{diff_files, FilePatch};
use crate::index::{encode_index, IndexEntry, StatInfo};
use crate::tree::{flatten_tree, write_tree, FileMap};
use crate::worktree::{validate_path, WorkTree, GIT_DIR};
use crate::{
    validate_ref_name, Commit, GitObject, LooseObjectStore, ObjectId, ObjectStore,
    ObjectStoreBackend, ObjectType, RefStore, Reference, Result, Signature, StorageError,
    TagObject,
};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Branch every commit is appended to.
pub const DEFAULT_BRANCH: &str = "refs/heads/main";

const TAG_PREFIX: &str = "refs/tags/";

/// Where the repository keeps its objects and working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// A `.git` directory and working tree on the filesystem.
    Disk,
    /// Ephemeral storage lost on process exit.
    InMemory,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disk => "disk",
            Self::InMemory => "memory",
        })
    }
}

/// A linear, single-branch git repository with a working tree.
///
/// Writes and deletes go to the working tree; [`Repository::commit`] stages
/// everything and appends one commit to `refs/heads/main`.
pub struct Repository {
    mode: StorageMode,
    root: Option<PathBuf>,
    objects: Box<dyn ObjectStoreBackend>,
    refs: RefStore,
    worktree: WorkTree,
    /// Staged snapshot: what the next commit's tree will contain.
    index: RwLock<FileMap>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("mode", &self.mode)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Creates a new repository.
    ///
    /// In disk mode, fails with [`StorageError::AlreadyExists`] if `location`
    /// already holds a repository; existing history is left untouched. In
    /// memory mode `location` is ignored and a fresh store is allocated.
    pub fn init(mode: StorageMode, location: impl AsRef<Path>) -> Result<Self> {
        match mode {
            StorageMode::InMemory => Ok(Self::in_memory()),
            StorageMode::Disk => {
                let root = location.as_ref().to_path_buf();
                let git_dir = root.join(GIT_DIR);
                if git_dir.exists() {
                    return Err(StorageError::AlreadyExists(root));
                }
                fs::create_dir_all(git_dir.join("refs/heads"))?;
                fs::create_dir_all(git_dir.join("refs/tags"))?;
                let objects = LooseObjectStore::open(git_dir.join("objects"))?;
                let refs = RefStore::open(&git_dir)?;
                refs.set_symbolic("HEAD", DEFAULT_BRANCH)?;
                tracing::debug!(root = %root.display(), "Initialized repository");

                Ok(Self {
                    mode,
                    worktree: WorkTree::disk(&root),
                    root: Some(root),
                    objects: Box::new(objects),
                    refs,
                    index: RwLock::new(FileMap::new()),
                })
            }
        }
    }

    /// Creates an empty in-memory repository.
    pub fn in_memory() -> Self {
        let refs = RefStore::new();
        // A fresh in-memory ref store cannot fail to record HEAD.
        let _ = refs.set_symbolic("HEAD", DEFAULT_BRANCH);
        Self {
            mode: StorageMode::InMemory,
            root: None,
            objects: Box::new(ObjectStore::new()),
            refs,
            worktree: WorkTree::memory(),
            index: RwLock::new(FileMap::new()),
        }
    }

    /// Opens an existing disk repository.
    pub fn open(location: impl AsRef<Path>) -> Result<Self> {
        let root = location.as_ref().to_path_buf();
        let git_dir = root.join(GIT_DIR);
        if !git_dir.is_dir() {
            return Err(StorageError::NotFound(git_dir.display().to_string()));
        }
        let repo = Self {
            mode: StorageMode::Disk,
            worktree: WorkTree::disk(&root),
            objects: Box::new(LooseObjectStore::open(git_dir.join("objects"))?),
            refs: RefStore::open(&git_dir)?,
            root: Some(root),
            index: RwLock::new(FileMap::new()),
        };
        if let Ok(head) = repo.head() {
            *repo.index.write() = repo.files_at(&head)?;
        }
        Ok(repo)
    }

    /// Returns the storage mode.
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    /// Returns the repository root for disk repositories.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    // ==================== Working tree ====================

    /// Writes a file into the working tree, creating parent directories.
    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.worktree.write(path, data)
    }

    /// Reads a file from the working tree.
    pub fn read_file(&self, path: &str) -> Result<Bytes> {
        self.worktree.read(path)
    }

    /// Returns true if the working tree contains the file.
    pub fn file_exists(&self, path: &str) -> bool {
        self.worktree.exists(path)
    }

    /// Removes a file from the working tree and the index.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.worktree.remove(path)?;
        self.index.write().remove(path);
        self.persist_index()
    }

    /// Creates a directory in the working tree.
    pub fn create_dir(&self, path: &str) -> Result<()> {
        self.worktree.create_dir(path)
    }

    /// Stages the whole working tree, including deletions.
    pub fn stage_all(&self) -> Result<()> {
        let mut staged = FileMap::new();
        for (path, data) in self.worktree.snapshot()? {
            let id = self.objects.put(GitObject::blob(data))?;
            staged.insert(path, id);
        }
        *self.index.write() = staged;
        self.persist_index()
    }

    /// Mirrors the staged snapshot to `.git/index` for disk repositories.
    fn persist_index(&self) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        let entries: Vec<IndexEntry> = self
            .index
            .read()
            .iter()
            .map(|(path, id)| IndexEntry {
                path: path.clone(),
                id: *id,
                stat: fs::metadata(root.join(path))
                    .map(|meta| StatInfo::from_metadata(&meta))
                    .unwrap_or_default(),
            })
            .collect();
        fs::write(root.join(GIT_DIR).join("index"), encode_index(&entries))?;
        Ok(())
    }

    // ==================== Commits ====================

    /// Stages all pending changes and appends a commit authored by `author`.
    pub fn commit(&self, author: &Signature, message: &str) -> Result<ObjectId> {
        self.stage_all()?;
        let tree_id = {
            let index = self.index.read();
            write_tree(self.objects.as_ref(), &index)?
        };

        // Get parent commits (current HEAD if it exists)
        let parents: Vec<ObjectId> = match self.head() {
            Ok(head) => vec![head],
            Err(StorageError::NoCommits) => vec![],
            Err(e) => return Err(e),
        };

        let commit = GitObject::commit(&tree_id, &parents, author, author, message);
        let commit_id = self.objects.put(commit)?;
        self.move_head(commit_id)?;

        tracing::debug!(commit = %commit_id, author = %author.name, "Committed");
        Ok(commit_id)
    }

    /// Returns the commit HEAD points at.
    pub fn head(&self) -> Result<ObjectId> {
        match self.refs.resolve_head() {
            Err(StorageError::RefNotFound(_)) => Err(StorageError::NoCommits),
            other => other,
        }
    }

    /// Loads a commit by id.
    pub fn commit_at(&self, id: &ObjectId) -> Result<Commit> {
        Commit::from_object(&self.objects.read(id)?)
    }

    /// Loads the flat file map of a commit's tree.
    pub fn files_at(&self, commit: &ObjectId) -> Result<FileMap> {
        let commit = self.commit_at(commit)?;
        flatten_tree(self.objects.as_ref(), &commit.tree)
    }

    /// Reads a file as it was at a commit.
    pub fn read_file_at(&self, commit: &ObjectId, path: &str) -> Result<Bytes> {
        validate_path(path)?;
        let files = self.files_at(commit)?;
        let blob = files
            .get(path)
            .ok_or_else(|| StorageError::NotFound(format!("{path} at {commit}")))?;
        Ok(self.objects.read(blob)?.data)
    }

    /// Computes the file changes that move `from` to `to`.
    pub fn diff(&self, from: &ObjectId, to: &ObjectId) -> Result<Vec<FilePatch>> {
        Ok(diff_files(&self.files_at(from)?, &self.files_at(to)?))
    }

    /// Moves HEAD, index and working tree to `id`.
    pub fn reset_hard(&self, id: &ObjectId) -> Result<()> {
        let files = self.files_at(id)?;
        let mut contents = BTreeMap::new();
        for (path, blob) in &files {
            contents.insert(path.clone(), self.objects.read(blob)?.data);
        }
        self.worktree.checkout(&contents)?;
        *self.index.write() = files;
        self.persist_index()?;
        self.move_head(*id)
    }

    /// Moves HEAD to `id`, leaving index and working tree untouched.
    pub fn reset_soft(&self, id: &ObjectId) -> Result<()> {
        self.commit_at(id)?;
        self.move_head(*id)
    }

    fn move_head(&self, id: ObjectId) -> Result<()> {
        match self.refs.current_branch_ref() {
            Some(branch) => self.refs.set(&branch, id),
            // Detached HEAD - update HEAD directly
            None => self.refs.set("HEAD", id),
        }
    }

    // ==================== Tags ====================

    /// Creates an annotated tag. Never overwrites an existing tag.
    pub fn create_tag(
        &self,
        name: &str,
        target: &ObjectId,
        tagger: &Signature,
        message: &str,
    ) -> Result<ObjectId> {
        validate_ref_name(name)?;
        let ref_name = format!("{TAG_PREFIX}{name}");
        if self.refs.contains(&ref_name) {
            return Err(StorageError::TagExists(name.to_string()));
        }
        if let Some(existing) = self.refs.conflicting(&ref_name) {
            return Err(StorageError::InvalidRef(format!(
                "{name:?} clashes with {existing}"
            )));
        }
        self.commit_at(target)?;
        let tag_id = self.objects.put(GitObject::tag(target, name, tagger, message))?;
        self.refs.set(&ref_name, tag_id)?;
        Ok(tag_id)
    }

    /// Deletes a tag.
    pub fn delete_tag(&self, name: &str) -> Result<()> {
        self.refs.delete(&format!("{TAG_PREFIX}{name}"))
    }

    /// Resolves a tag to the commit it points at.
    pub fn tag_target(&self, name: &str) -> Result<ObjectId> {
        let reference = self.refs.get(&format!("{TAG_PREFIX}{name}"))?;
        let id = reference
            .as_direct()
            .ok_or_else(|| StorageError::InvalidRef(format!("tag {name} is symbolic")))?;
        self.peel(id)
    }

    /// Lists tags and their target commits, sorted by name.
    pub fn list_tags(&self) -> Result<Vec<(String, ObjectId)>> {
        self.refs
            .list(TAG_PREFIX)
            .into_iter()
            .filter_map(|(name, reference)| match reference {
                Reference::Direct(id) => Some((name, id)),
                Reference::Symbolic(_) => None,
            })
            .map(|(name, id)| {
                let short = name.trim_start_matches(TAG_PREFIX).to_string();
                Ok((short, self.peel(id)?))
            })
            .collect()
    }

    /// Follows annotated tags down to a commit.
    fn peel(&self, mut id: ObjectId) -> Result<ObjectId> {
        loop {
            let object = self.objects.read(&id)?;
            match object.object_type {
                ObjectType::Commit => return Ok(id),
                ObjectType::Tag => id = TagObject::from_object(&object)?.target,
                other => {
                    return Err(StorageError::InvalidObject(format!(
                        "tag points at a {}",
                        other.as_str()
                    )))
                }
            }
        }
    }

    pub(crate) fn objects(&self) -> &dyn ObjectStoreBackend {
        self.objects.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn author() -> Signature {
        Signature::now("alice", "alice@example.com")
    }

    #[test]
    fn test_commit_and_read_back() {
        let repo = Repository::in_memory();
        assert!(matches!(repo.head(), Err(StorageError::NoCommits)));

        repo.write_file("k8s-policies/ns1/a.yaml", b"a: 1\n").unwrap();
        let first = repo.commit(&author(), "Created a").unwrap();
        assert_eq!(repo.head().unwrap(), first);

        let commit = repo.commit_at(&first).unwrap();
        assert!(commit.parents.is_empty());
        assert_eq!(commit.message, "Created a");
        assert_eq!(
            repo.read_file_at(&first, "k8s-policies/ns1/a.yaml").unwrap().as_ref(),
            b"a: 1\n"
        );

        repo.delete_file("k8s-policies/ns1/a.yaml").unwrap();
        let second = repo.commit(&author(), "Deleted a").unwrap();
        assert_eq!(repo.commit_at(&second).unwrap().parent(), Some(first));
        assert!(repo.files_at(&second).unwrap().is_empty());
    }

    #[test]
    fn test_delete_missing_file() {
        let repo = Repository::in_memory();
        assert!(matches!(
            repo.delete_file("k8s-policies/ns/none.yaml"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_reset_hard_then_soft() {
        let repo = Repository::in_memory();
        repo.write_file("a.yaml", b"1").unwrap();
        let h1 = repo.commit(&author(), "one").unwrap();
        repo.write_file("a.yaml", b"2").unwrap();
        repo.write_file("b.yaml", b"b").unwrap();
        let h2 = repo.commit(&author(), "two").unwrap();

        repo.reset_hard(&h1).unwrap();
        assert_eq!(repo.head().unwrap(), h1);
        assert_eq!(repo.read_file("a.yaml").unwrap().as_ref(), b"1");
        assert!(!repo.file_exists("b.yaml"));

        repo.reset_soft(&h2).unwrap();
        assert_eq!(repo.head().unwrap(), h2);
        assert_eq!(repo.read_file("a.yaml").unwrap().as_ref(), b"1");

        // Committing now records the full delta from h2 back to h1's content.
        let h3 = repo.commit(&author(), "back").unwrap();
        assert_eq!(repo.commit_at(&h3).unwrap().parent(), Some(h2));
        assert_eq!(
            repo.commit_at(&h3).unwrap().tree,
            repo.commit_at(&h1).unwrap().tree
        );
    }

    #[test]
    fn test_tags() {
        let repo = Repository::in_memory();
        repo.write_file("a.yaml", b"1").unwrap();
        let h1 = repo.commit(&author(), "one").unwrap();
        repo.write_file("a.yaml", b"2").unwrap();
        let h2 = repo.commit(&author(), "two").unwrap();

        repo.create_tag("good", &h1, &author(), "good").unwrap();
        assert!(matches!(
            repo.create_tag("good", &h2, &author(), "good"),
            Err(StorageError::TagExists(_))
        ));
        assert_eq!(repo.tag_target("good").unwrap(), h1);
        assert_eq!(repo.list_tags().unwrap(), vec![("good".to_string(), h1)]);

        repo.delete_tag("good").unwrap();
        assert!(matches!(
            repo.tag_target("good"),
            Err(StorageError::RefNotFound(_))
        ));
    }

    #[test]
    fn test_tag_unknown_commit() {
        let repo = Repository::in_memory();
        let missing = ObjectId::from_bytes([8u8; 20]);
        assert!(matches!(
            repo.create_tag("t", &missing, &author(), "t"),
            Err(StorageError::ObjectNotFound(_))
        ));
    }
}
