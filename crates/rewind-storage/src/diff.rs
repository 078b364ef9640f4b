//! File-level diffs between snapshots.

use crate::tree::FileMap;
use crate::ObjectId;
use std::fmt;

/// How a file changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Present only in the newer snapshot.
    Added,
    /// Present in both with different content.
    Modified,
    /// Present only in the older snapshot.
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        })
    }
}

/// A single file's change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Relative path of the file.
    pub path: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Blob on the "from" side, absent when added.
    pub from: Option<ObjectId>,
    /// Blob on the "to" side, absent when deleted.
    pub to: Option<ObjectId>,
}

/// Computes the changes needed to move from `from` to `to`, ordered by path.
pub fn diff_files(from: &FileMap, to: &FileMap) -> Vec<FilePatch> {
    let mut patches = Vec::new();

    for (path, old) in from {
        match to.get(path) {
            None => patches.push(FilePatch {
                path: path.clone(),
                kind: ChangeKind::Deleted,
                from: Some(*old),
                to: None,
            }),
            Some(new) if new != old => patches.push(FilePatch {
                path: path.clone(),
                kind: ChangeKind::Modified,
                from: Some(*old),
                to: Some(*new),
            }),
            Some(_) => {}
        }
    }
    for (path, new) in to {
        if !from.contains_key(path) {
            patches.push(FilePatch {
                path: path.clone(),
                kind: ChangeKind::Added,
                from: None,
                to: Some(*new),
            });
        }
    }

    patches.sort_by(|a, b| a.path.cmp(&b.path));
    patches
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(b: u8) -> ObjectId {
        ObjectId::from_bytes([b; 20])
    }

    #[test]
    fn test_diff_kinds() {
        let mut from = FileMap::new();
        from.insert("a.yaml".to_string(), id(1));
        from.insert("b.yaml".to_string(), id(2));
        from.insert("c.yaml".to_string(), id(3));

        let mut to = FileMap::new();
        to.insert("b.yaml".to_string(), id(2));
        to.insert("c.yaml".to_string(), id(4));
        to.insert("d.yaml".to_string(), id(5));

        let patches = diff_files(&from, &to);
        let summary: Vec<(&str, ChangeKind)> =
            patches.iter().map(|p| (p.path.as_str(), p.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("a.yaml", ChangeKind::Deleted),
                ("c.yaml", ChangeKind::Modified),
                ("d.yaml", ChangeKind::Added),
            ]
        );
        assert_eq!(patches[0].to, None);
        assert_eq!(patches[2].from, None);
    }

    #[test]
    fn test_diff_identical() {
        let mut files = FileMap::new();
        files.insert("a.yaml".to_string(), id(1));
        assert!(diff_files(&files, &files).is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_patches_transform_from_into_to(
            from in proptest::collection::btree_map("[a-c]/[a-c]\\.yaml", 0u8..4, 0..8),
            to in proptest::collection::btree_map("[a-c]/[a-c]\\.yaml", 0u8..4, 0..8),
        ) {
            let from: FileMap = from.into_iter().map(|(p, b)| (p, id(b))).collect();
            let to: FileMap = to.into_iter().map(|(p, b)| (p, id(b))).collect();

            let mut applied = from.clone();
            for patch in diff_files(&from, &to) {
                match patch.to {
                    Some(blob) => applied.insert(patch.path, blob),
                    None => applied.remove(&patch.path),
                };
            }
            proptest::prop_assert_eq!(applied, to);
        }
    }
}
