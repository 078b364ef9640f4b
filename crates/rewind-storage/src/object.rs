//! Git object types and utilities.

use crate::{Result, Signature, StorageError};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// A 20-byte SHA-1 object identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 20]);

impl ObjectId {
    /// Creates an ObjectId from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an ObjectId from a hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != 40 {
            return Err(StorageError::InvalidObject(format!(
                "invalid object id length: {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(hex, &mut bytes)
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Computes the SHA-1 hash of data with a git object header.
    pub fn hash_object(object_type: ObjectType, data: &[u8]) -> Self {
        let header = format!("{} {}\0", object_type.as_str(), data.len());
        let mut hasher = Sha1::new();
        hasher.update(header.as_bytes());
        hasher.update(data);
        let result = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&result);
        Self(bytes)
    }
}

impl FromStr for ObjectId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s.trim())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Git object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// File content.
    Blob,
    /// Directory listing.
    Tree,
    /// Commit object.
    Commit,
    /// Annotated tag.
    Tag,
}

impl ObjectType {
    /// Returns the string representation used in git.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }

    /// Parses an object type from a string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            _ => Err(StorageError::InvalidObject(format!(
                "unknown object type: {}",
                s
            ))),
        }
    }
}

/// A git object (blob, tree, commit, or tag).
#[derive(Debug, Clone)]
pub struct GitObject {
    /// The object's unique identifier (SHA-1 hash).
    pub id: ObjectId,
    /// The type of object.
    pub object_type: ObjectType,
    /// The raw object data (uncompressed).
    pub data: Bytes,
}

impl GitObject {
    /// Creates a new git object, computing its ID from the data.
    pub fn new(object_type: ObjectType, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let id = ObjectId::hash_object(object_type, &data);
        Self {
            id,
            object_type,
            data,
        }
    }

    /// Creates a blob object from file content.
    pub fn blob(content: impl Into<Bytes>) -> Self {
        Self::new(ObjectType::Blob, content)
    }

    /// Creates a commit object.
    pub fn commit(
        tree_id: &ObjectId,
        parents: &[ObjectId],
        author: &Signature,
        committer: &Signature,
        message: &str,
    ) -> Self {
        let mut content = format!("tree {}\n", tree_id);
        for parent in parents {
            content.push_str(&format!("parent {}\n", parent));
        }
        content.push_str(&format!("author {}\n", author.encode()));
        content.push_str(&format!("committer {}\n", committer.encode()));
        content.push_str(&format!("\n{}", message));
        Self::new(ObjectType::Commit, content.into_bytes())
    }

    /// Creates an annotated tag object pointing at a commit.
    pub fn tag(target: &ObjectId, name: &str, tagger: &Signature, message: &str) -> Self {
        let content = format!(
            "object {}\ntype commit\ntag {}\ntagger {}\n\n{}",
            target,
            name,
            tagger.encode(),
            message
        );
        Self::new(ObjectType::Tag, content.into_bytes())
    }

    /// Returns the size of the object data.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A decoded commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Commit hash.
    pub id: ObjectId,
    /// Root tree of the snapshot.
    pub tree: ObjectId,
    /// Parent commits (at most one in a linear history).
    pub parents: Vec<ObjectId>,
    /// Author signature.
    pub author: Signature,
    /// Committer signature.
    pub committer: Signature,
    /// Full commit message.
    pub message: String,
}

impl Commit {
    /// Decodes a commit from a git object.
    pub fn from_object(object: &GitObject) -> Result<Self> {
        if object.object_type != ObjectType::Commit {
            return Err(StorageError::InvalidObject(format!(
                "{} is a {}, not a commit",
                object.id,
                object.object_type.as_str()
            )));
        }
        let text = std::str::from_utf8(&object.data)
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        let (headers, message) = split_message(text);

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        for line in headers.lines() {
            match line.split_once(' ') {
                Some(("tree", value)) => tree = Some(ObjectId::from_hex(value)?),
                Some(("parent", value)) => parents.push(ObjectId::from_hex(value)?),
                Some(("author", value)) => author = Some(Signature::parse(value)?),
                Some(("committer", value)) => committer = Some(Signature::parse(value)?),
                _ => {}
            }
        }

        let missing = |field: &str| {
            StorageError::InvalidObject(format!("commit {} has no {} header", object.id, field))
        };
        let author = author.ok_or_else(|| missing("author"))?;
        Ok(Self {
            id: object.id,
            tree: tree.ok_or_else(|| missing("tree"))?,
            parents,
            committer: committer.unwrap_or_else(|| author.clone()),
            author,
            message: message.to_string(),
        })
    }

    /// Returns the first parent, if any.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }
}

/// A decoded annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagObject {
    /// Tag object hash.
    pub id: ObjectId,
    /// Object the tag points at.
    pub target: ObjectId,
    /// Type of the target object.
    pub target_type: ObjectType,
    /// Tag name.
    pub name: String,
    /// Tagger signature.
    pub tagger: Option<Signature>,
    /// Tag message.
    pub message: String,
}

impl TagObject {
    /// Decodes an annotated tag from a git object.
    pub fn from_object(object: &GitObject) -> Result<Self> {
        if object.object_type != ObjectType::Tag {
            return Err(StorageError::InvalidObject(format!(
                "{} is a {}, not a tag",
                object.id,
                object.object_type.as_str()
            )));
        }
        let text = std::str::from_utf8(&object.data)
            .map_err(|e| StorageError::InvalidObject(e.to_string()))?;
        let (headers, message) = split_message(text);

        let mut target = None;
        let mut target_type = ObjectType::Commit;
        let mut name = String::new();
        let mut tagger = None;
        for line in headers.lines() {
            match line.split_once(' ') {
                Some(("object", value)) => target = Some(ObjectId::from_hex(value)?),
                Some(("type", value)) => target_type = ObjectType::parse(value)?,
                Some(("tag", value)) => name = value.to_string(),
                Some(("tagger", value)) => tagger = Some(Signature::parse(value)?),
                _ => {}
            }
        }

        Ok(Self {
            id: object.id,
            target: target.ok_or_else(|| {
                StorageError::InvalidObject(format!("tag {} has no object header", object.id))
            })?,
            target_type,
            name,
            tagger,
            message: message.to_string(),
        })
    }
}

/// Splits a commit or tag body into its header block and message.
fn split_message(text: &str) -> (&str, &str) {
    match text.split_once("\n\n") {
        Some((headers, message)) => (headers, message),
        None => (text, ""),
    }
}
