//! Tree objects: encoding, decoding, and conversion to and from flat file maps.
//!
//! The versioned store works with flat `path -> blob id` maps. Trees are only
//! materialized when a commit is written or a historical snapshot is read.

use crate::{GitObject, ObjectId, ObjectStoreBackend, ObjectType, Result, StorageError};
use std::collections::BTreeMap;

/// Flat snapshot of a tree: `/`-separated relative path to blob id.
pub type FileMap = BTreeMap<String, ObjectId>;

const MODE_FILE: &str = "100644";
const MODE_DIR: &str = "40000";

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// Regular file (blob).
    File,
    /// Subdirectory (tree).
    Directory,
}

impl EntryMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::File => MODE_FILE,
            Self::Directory => MODE_DIR,
        }
    }

    fn parse(mode: &str) -> Result<Self> {
        match mode {
            "40000" | "040000" => Ok(Self::Directory),
            m if m.starts_with("100") || m == "120000" => Ok(Self::File),
            other => Err(StorageError::InvalidObject(format!(
                "unsupported tree entry mode: {other}"
            ))),
        }
    }
}

/// A single entry in a tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Entry mode.
    pub mode: EntryMode,
    /// File or directory name (no slashes).
    pub name: String,
    /// Blob or tree id.
    pub id: ObjectId,
}

impl TreeEntry {
    /// Git orders directories as if their name ended in `/`.
    fn sort_key(&self) -> String {
        match self.mode {
            EntryMode::Directory => format!("{}/", self.name),
            EntryMode::File => self.name.clone(),
        }
    }
}

/// Encodes tree entries in canonical git order.
pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.sort_key());

    let mut data = Vec::new();
    for entry in sorted {
        data.extend_from_slice(entry.mode.as_str().as_bytes());
        data.push(b' ');
        data.extend_from_slice(entry.name.as_bytes());
        data.push(0);
        data.extend_from_slice(entry.id.as_bytes());
    }
    data
}

/// Parses the body of a tree object.
pub fn parse_tree(data: &[u8]) -> Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let space = data[pos..]
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| StorageError::InvalidObject("tree entry missing mode".to_string()))?;
        let mode = std::str::from_utf8(&data[pos..pos + space])
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        let mode = EntryMode::parse(mode)?;
        pos += space + 1;

        let nul = data[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| StorageError::InvalidObject("tree entry missing name".to_string()))?;
        let name = String::from_utf8(data[pos..pos + nul].to_vec())
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        pos += nul + 1;

        if pos + 20 > data.len() {
            return Err(StorageError::InvalidObject(
                "tree entry truncated".to_string(),
            ));
        }
        let mut id = [0u8; 20];
        id.copy_from_slice(&data[pos..pos + 20]);
        pos += 20;

        entries.push(TreeEntry {
            mode,
            name,
            id: ObjectId::from_bytes(id),
        });
    }
    Ok(entries)
}

enum Node {
    File(ObjectId),
    Dir(BTreeMap<String, Node>),
}

/// Writes nested tree objects for a flat file map and returns the root tree id.
pub fn write_tree(store: &dyn ObjectStoreBackend, files: &FileMap) -> Result<ObjectId> {
    let mut root = BTreeMap::new();
    for (path, id) in files {
        insert(&mut root, path, *id)?;
    }
    write_dir(store, &root)
}

fn insert(dir: &mut BTreeMap<String, Node>, path: &str, id: ObjectId) -> Result<()> {
    match path.split_once('/') {
        None => {
            dir.insert(path.to_string(), Node::File(id));
            Ok(())
        }
        Some((head, rest)) => {
            let child = dir
                .entry(head.to_string())
                .or_insert_with(|| Node::Dir(BTreeMap::new()));
            match child {
                Node::Dir(children) => insert(children, rest, id),
                Node::File(_) => Err(StorageError::InvalidPath(format!(
                    "{path}: parent is a file"
                ))),
            }
        }
    }
}

fn write_dir(store: &dyn ObjectStoreBackend, dir: &BTreeMap<String, Node>) -> Result<ObjectId> {
    let mut entries = Vec::with_capacity(dir.len());
    for (name, node) in dir {
        let entry = match node {
            Node::File(id) => TreeEntry {
                mode: EntryMode::File,
                name: name.clone(),
                id: *id,
            },
            Node::Dir(children) => TreeEntry {
                mode: EntryMode::Directory,
                name: name.clone(),
                id: write_dir(store, children)?,
            },
        };
        entries.push(entry);
    }
    store.put(GitObject::new(ObjectType::Tree, encode_tree(&entries)))
}

/// Reads a tree recursively into a flat file map.
pub fn flatten_tree(store: &dyn ObjectStoreBackend, tree_id: &ObjectId) -> Result<FileMap> {
    let mut files = FileMap::new();
    flatten_into(store, tree_id, "", &mut files)?;
    Ok(files)
}

fn flatten_into(
    store: &dyn ObjectStoreBackend,
    tree_id: &ObjectId,
    prefix: &str,
    files: &mut FileMap,
) -> Result<()> {
    let object = store.read(tree_id)?;
    if object.object_type != ObjectType::Tree {
        return Err(StorageError::InvalidObject(format!(
            "{} is a {}, not a tree",
            tree_id,
            object.object_type.as_str()
        )));
    }
    for entry in parse_tree(&object.data)? {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            format!("{prefix}/{}", entry.name)
        };
        match entry.mode {
            EntryMode::File => {
                files.insert(path, entry.id);
            }
            EntryMode::Directory => flatten_into(store, &entry.id, &path, files)?,
        }
    }
    Ok(())
}
