//! The `.git/index` file (DIRC version 2).
//!
//! Disk repositories keep the index in step with the staged snapshot so that
//! `git status` inside the audit repository reports a clean tree.

use crate::{ObjectId, Result, StorageError};
use sha1::{Digest, Sha1};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

const SIGNATURE: &[u8; 4] = b"DIRC";
const VERSION: u32 = 2;
const REGULAR_FILE: u32 = 0o100644;
const NAME_MASK: usize = 0x0fff;
/// Fixed-size part of an entry: ten stat words, the object id and the flags.
const ENTRY_HEADER: usize = 62;

/// Cached stat data for one entry.
///
/// Git only uses it to skip rehashing unchanged files, so zeroes are valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatInfo {
    pub ctime: (u32, u32),
    pub mtime: (u32, u32),
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl StatInfo {
    /// Captures the fields git compares from file metadata.
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| (d.as_secs() as u32, d.subsec_nanos()))
            .unwrap_or_default();
        let mut stat = Self {
            ctime: mtime,
            mtime,
            size: meta.len() as u32,
            ..Self::default()
        };
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            stat.ctime = (meta.ctime() as u32, meta.ctime_nsec() as u32);
            stat.dev = meta.dev() as u32;
            stat.ino = meta.ino() as u32;
            stat.uid = meta.uid();
            stat.gid = meta.gid();
        }
        stat
    }
}

/// One staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub id: ObjectId,
    pub stat: StatInfo,
}

/// Encodes entries, which must be sorted by path, into an index file.
pub fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + entries.len() * (ENTRY_HEADER + 32) + 20);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());

    for entry in entries {
        let start = out.len();
        let stat = &entry.stat;
        for word in [
            stat.ctime.0,
            stat.ctime.1,
            stat.mtime.0,
            stat.mtime.1,
            stat.dev,
            stat.ino,
            REGULAR_FILE,
            stat.uid,
            stat.gid,
            stat.size,
        ] {
            out.extend_from_slice(&word.to_be_bytes());
        }
        out.extend_from_slice(entry.id.as_bytes());
        let name = entry.path.as_bytes();
        out.extend_from_slice(&(name.len().min(NAME_MASK) as u16).to_be_bytes());
        out.extend_from_slice(name);
        // NUL-terminated, padded to a multiple of eight bytes.
        let padded = (ENTRY_HEADER + name.len() + 8) & !7;
        out.resize(start + padded, 0);
    }

    let checksum = Sha1::digest(&out);
    out.extend_from_slice(&checksum);
    out
}

/// Decodes an index file back into its entries.
pub fn parse_index(data: &[u8]) -> Result<Vec<IndexEntry>> {
    let invalid = |why: &str| StorageError::InvalidObject(format!("index: {why}"));
    if data.len() < 32 {
        return Err(invalid("truncated"));
    }
    let (body, checksum) = data.split_at(data.len() - 20);
    if Sha1::digest(body).as_slice() != checksum {
        return Err(StorageError::Corruption("index checksum mismatch".into()));
    }
    if &body[..4] != SIGNATURE {
        return Err(invalid("bad signature"));
    }
    if read_u32(body, 4) != VERSION {
        return Err(invalid("unsupported version"));
    }

    let count = read_u32(body, 8) as usize;
    let mut entries = Vec::new();
    let mut pos = 12;
    for _ in 0..count {
        if pos + ENTRY_HEADER > body.len() {
            return Err(invalid("truncated entry"));
        }
        let word = |i: usize| read_u32(body, pos + i * 4);
        let stat = StatInfo {
            ctime: (word(0), word(1)),
            mtime: (word(2), word(3)),
            dev: word(4),
            ino: word(5),
            uid: word(7),
            gid: word(8),
            size: word(9),
        };
        let mut id = [0u8; 20];
        id.copy_from_slice(&body[pos + 40..pos + 60]);

        let name_start = pos + ENTRY_HEADER;
        let name_len = body[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid("unterminated path"))?;
        let path = std::str::from_utf8(&body[name_start..name_start + name_len])
            .map_err(|_| invalid("path is not UTF-8"))?;
        entries.push(IndexEntry {
            path: path.to_string(),
            id: ObjectId::from_bytes(id),
            stat,
        });
        pos += (ENTRY_HEADER + name_len + 8) & !7;
    }
    Ok(entries)
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(word)
}
