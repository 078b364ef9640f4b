//! Object stores: in-memory map and on-disk loose objects.

use crate::{GitObject, ObjectId, ObjectStoreBackend, ObjectType, Result, StorageError};
use bytes::Bytes;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Content-addressed object store held in memory.
#[derive(Debug, Default)]
pub struct ObjectStore {
    /// Objects indexed by their SHA-1 hash.
    objects: RwLock<HashMap<ObjectId, GitObject>>,
}

impl ObjectStore {
    /// Creates a new empty object store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStoreBackend for ObjectStore {
    fn put(&self, object: GitObject) -> Result<ObjectId> {
        let id = object.id;
        self.objects.write().insert(id, object);
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<GitObject>> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.objects.read().contains_key(id))
    }
}

/// Git-compatible loose object directory (`.git/objects/xx/yyyy...`).
#[derive(Debug, Clone)]
pub struct LooseObjectStore {
    dir: PathBuf,
}

impl LooseObjectStore {
    /// Opens a loose object directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the object directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.dir.join(&hex[..2]).join(&hex[2..])
    }
}

impl ObjectStoreBackend for LooseObjectStore {
    fn put(&self, object: GitObject) -> Result<ObjectId> {
        let id = object.id;
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let compressed = compress(&object)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so readers never observe a partial object.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, compressed)?;
        fs::rename(&tmp, &path)?;
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> Result<Option<GitObject>> {
        let compressed = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object = decompress(&compressed)?;
        if object.id != *id {
            return Err(StorageError::Corruption(format!(
                "object {} hashes to {}",
                id, object.id
            )));
        }
        Ok(Some(object))
    }

    fn contains(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.object_path(id).exists())
    }
}

/// Compresses an object into git's loose format using zlib.
pub fn compress(object: &GitObject) -> Result<Vec<u8>> {
    let header = format!("{} {}\0", object.object_type.as_str(), object.data.len());
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(header.as_bytes())
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    encoder
        .write_all(&object.data)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))
}

/// Decompresses a loose object from zlib.
pub fn decompress(compressed: &[u8]) -> Result<GitObject> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| StorageError::Compression(e.to_string()))?;

    // Parse header: "type size\0data"
    let null_pos = decompressed.iter().position(|&b| b == 0).ok_or_else(|| {
        StorageError::InvalidObject("missing null byte in header".to_string())
    })?;

    let header = String::from_utf8_lossy(&decompressed[..null_pos]);
    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 {
        return Err(StorageError::InvalidObject(format!(
            "invalid header: {}",
            header
        )));
    }

    let object_type = ObjectType::parse(parts[0])?;
    let size: usize = parts[1]
        .parse()
        .map_err(|_| StorageError::InvalidObject("invalid size".to_string()))?;

    let data = Bytes::from(decompressed[null_pos + 1..].to_vec());
    if data.len() != size {
        return Err(StorageError::InvalidObject(format!(
            "size mismatch: header says {}, found {}",
            size,
            data.len()
        )));
    }
    Ok(GitObject::new(object_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_store_roundtrip() {
        let store = ObjectStore::new();
        let blob = GitObject::blob(b"Hello, World!".to_vec());
        let id = store.put(blob).unwrap();

        let retrieved = store.read(&id).unwrap();
        assert_eq!(retrieved.data.as_ref(), b"Hello, World!");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_object_compression_roundtrip() {
        let original = GitObject::blob(b"Hello, World!".to_vec());
        let compressed = compress(&original).unwrap();
        let decompressed = decompress(&compressed).unwrap();

        assert_eq!(original.id, decompressed.id);
        assert_eq!(original.object_type, decompressed.object_type);
        assert_eq!(original.data, decompressed.data);
    }

    #[test]
    fn test_decompress_garbage() {
        assert!(decompress(b"definitely not zlib").is_err());
    }

    #[test]
    fn test_loose_store_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(tmp.path().join("objects")).unwrap();
        let blob = GitObject::blob(b"hello\n".to_vec());
        let id = store.put(blob).unwrap();

        let on_disk = tmp
            .path()
            .join("objects/ce/013625030ba8dba906f756967f9e9ca394464a");
        assert!(on_disk.exists());
        assert!(store.contains(&id).unwrap());
        assert_eq!(store.read(&id).unwrap().data.as_ref(), b"hello\n");
    }

    #[test]
    fn test_loose_store_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(tmp.path()).unwrap();
        let id = ObjectId::from_bytes([9u8; 20]);
        assert!(store.get(&id).unwrap().is_none());
        assert!(!store.contains(&id).unwrap());
    }

    #[test]
    fn test_loose_store_detects_corruption() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LooseObjectStore::open(tmp.path()).unwrap();
        let a = GitObject::blob(b"a".to_vec());
        let b = GitObject::blob(b"b".to_vec());
        store.put(a.clone()).unwrap();
        let b_id = store.put(b).unwrap();

        // Overwrite b's file with a's content.
        let a_path = store.object_path(&a.id);
        let b_path = store.object_path(&b_id);
        fs::copy(a_path, &b_path).unwrap();

        assert!(matches!(
            store.get(&b_id),
            Err(StorageError::Corruption(_))
        ));
    }
}
