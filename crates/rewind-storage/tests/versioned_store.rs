//! Versioned store behavior on a real filesystem.
//!
//! Covers repository initialization, reopening, resets, diffs and tags
//! against a `.git` directory that stock git tooling can read.

use rewind_storage::index::parse_index;
use rewind_storage::{ChangeKind, Repository, Signature, StorageError, StorageMode};

fn author() -> Signature {
    Signature::now("audit-init", "system@audit.antrea.io")
}

#[test]
fn test_init_creates_git_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();
    assert_eq!(repo.mode(), StorageMode::Disk);

    let git = tmp.path().join(".git");
    assert!(git.join("objects").is_dir());
    assert!(git.join("refs/heads").is_dir());
    assert!(git.join("refs/tags").is_dir());
    assert_eq!(
        std::fs::read_to_string(git.join("HEAD")).unwrap(),
        "ref: refs/heads/main\n"
    );
}

#[test]
fn test_init_refuses_existing_repository() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();
    repo.write_file("antrea-tiers/gold.yaml", b"kind: Tier\n").unwrap();
    let head = repo.commit(&author(), "Initial commit of existing policies").unwrap();
    drop(repo);

    assert!(matches!(
        Repository::init(StorageMode::Disk, tmp.path()),
        Err(StorageError::AlreadyExists(_))
    ));

    let reopened = Repository::open(tmp.path()).unwrap();
    assert_eq!(reopened.head().unwrap(), head);
    assert_eq!(
        reopened.read_file("antrea-tiers/gold.yaml").unwrap().as_ref(),
        b"kind: Tier\n"
    );
}

#[test]
fn test_open_missing_repository() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(matches!(
        Repository::open(tmp.path()),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn test_disk_commit_history_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();

    repo.write_file("k8s-policies/ns1/allow.yaml", b"v1").unwrap();
    let first = repo.commit(&author(), "one").unwrap();
    repo.write_file("k8s-policies/ns1/allow.yaml", b"v2").unwrap();
    repo.write_file("antrea-policies/ns2/deny.yaml", b"deny").unwrap();
    let second = repo.commit(&author(), "two").unwrap();
    drop(repo);

    let repo = Repository::open(tmp.path()).unwrap();
    let commit = repo.commit_at(&second).unwrap();
    assert_eq!(commit.parents, vec![first]);
    assert_eq!(commit.author.email, "system@audit.antrea.io");

    let patches = repo.diff(&first, &second).unwrap();
    let kinds: Vec<(&str, ChangeKind)> = patches
        .iter()
        .map(|p| (p.path.as_str(), p.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("antrea-policies/ns2/deny.yaml", ChangeKind::Added),
            ("k8s-policies/ns1/allow.yaml", ChangeKind::Modified),
        ]
    );
}

#[test]
fn test_disk_reset_hard_restores_working_tree() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();

    repo.write_file("antrea-tiers/a.yaml", b"a").unwrap();
    let first = repo.commit(&author(), "one").unwrap();
    repo.write_file("antrea-tiers/b.yaml", b"b").unwrap();
    repo.delete_file("antrea-tiers/a.yaml").unwrap();
    let second = repo.commit(&author(), "two").unwrap();

    repo.reset_hard(&first).unwrap();
    assert!(tmp.path().join("antrea-tiers/a.yaml").is_file());
    assert!(!tmp.path().join("antrea-tiers/b.yaml").exists());
    assert_eq!(repo.head().unwrap(), first);

    repo.reset_soft(&second).unwrap();
    let third = repo.commit(&author(), "restore").unwrap();
    let patches = repo.diff(&second, &third).unwrap();
    assert_eq!(patches.len(), 2);
    assert_eq!(repo.files_at(&third).unwrap(), repo.files_at(&first).unwrap());
}

#[test]
fn test_disk_tags_persist() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();
    repo.write_file("antrea-tiers/a.yaml", b"a").unwrap();
    let head = repo.commit(&author(), "one").unwrap();
    repo.create_tag("known-good", &head, &author(), "known-good").unwrap();
    drop(repo);

    assert!(tmp.path().join(".git/refs/tags/known-good").is_file());
    let repo = Repository::open(tmp.path()).unwrap();
    assert_eq!(repo.tag_target("known-good").unwrap(), head);
    assert!(matches!(
        repo.create_tag("known-good", &head, &author(), "again"),
        Err(StorageError::TagExists(_))
    ));
}

#[test]
fn test_in_memory_mode_ignores_location() {
    let repo = Repository::init(StorageMode::InMemory, "/nonexistent/location").unwrap();
    assert_eq!(repo.mode(), StorageMode::InMemory);
    assert!(repo.root().is_none());
    assert!(matches!(repo.head(), Err(StorageError::NoCommits)));
}

#[test]
fn test_nested_tag_names_clash_in_both_modes() {
    let tmp = tempfile::tempdir().unwrap();
    for mode in [StorageMode::InMemory, StorageMode::Disk] {
        let location = tmp.path().join(mode.to_string());
        let repo = Repository::init(mode, &location).unwrap();
        repo.write_file("antrea-tiers/a.yaml", b"a").unwrap();
        let head = repo.commit(&author(), "one").unwrap();

        repo.create_tag("rel", &head, &author(), "rel").unwrap();
        assert!(
            matches!(
                repo.create_tag("rel/1", &head, &author(), "rel/1"),
                Err(StorageError::InvalidRef(_))
            ),
            "{mode}: tag under an existing tag"
        );

        repo.create_tag("v1/final", &head, &author(), "v1/final").unwrap();
        assert!(
            matches!(
                repo.create_tag("v1", &head, &author(), "v1"),
                Err(StorageError::InvalidRef(_))
            ),
            "{mode}: tag over an existing tag directory"
        );

        repo.create_tag("release", &head, &author(), "release").unwrap();
        let names: Vec<String> = repo.list_tags().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["rel", "release", "v1/final"], "{mode}");
    }
}

fn index_paths(root: &std::path::Path) -> Vec<(String, rewind_storage::ObjectId)> {
    let data = std::fs::read(root.join(".git/index")).unwrap();
    parse_index(&data)
        .unwrap()
        .into_iter()
        .map(|e| (e.path, e.id))
        .collect()
}

#[test]
fn test_git_index_tracks_commits_and_resets() {
    let tmp = tempfile::tempdir().unwrap();
    let repo = Repository::init(StorageMode::Disk, tmp.path()).unwrap();

    repo.write_file("antrea-tiers/gold.yaml", b"gold").unwrap();
    repo.write_file("k8s-policies/ns1/a.yaml", b"a").unwrap();
    let first = repo.commit(&author(), "one").unwrap();
    let expected: Vec<_> = repo.files_at(&first).unwrap().into_iter().collect();
    assert_eq!(index_paths(tmp.path()), expected);

    let data = std::fs::read(tmp.path().join(".git/index")).unwrap();
    let gold = parse_index(&data).unwrap().remove(0);
    assert_eq!(gold.stat.size, 4);

    repo.delete_file("antrea-tiers/gold.yaml").unwrap();
    let second = repo.commit(&author(), "two").unwrap();
    assert_eq!(
        index_paths(tmp.path()),
        repo.files_at(&second).unwrap().into_iter().collect::<Vec<_>>()
    );

    repo.reset_hard(&first).unwrap();
    assert_eq!(index_paths(tmp.path()), expected);
}
