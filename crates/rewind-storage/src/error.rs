//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A work tree file was not found.
    #[error("file not found: {0}")]
    NotFound(String),

    /// A git object was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A reference was not found.
    #[error("reference not found: {0}")]
    RefNotFound(String),

    /// An object could not be decoded or has the wrong type.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// A reference name or value is malformed.
    #[error("invalid reference: {0}")]
    InvalidRef(String),

    /// A work tree path escapes the repository or is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// zlib compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Stored bytes do not hash to the expected object id.
    #[error("corruption detected: {0}")]
    Corruption(String),

    /// A repository already exists at the location.
    #[error("repository already exists at {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A tag with this name already exists.
    #[error("tag already exists: {0}")]
    TagExists(String),

    /// HEAD does not point at any commit yet.
    #[error("repository has no commits yet")]
    NoCommits,
}
