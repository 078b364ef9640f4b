//! History walk with time and path filtering.

use crate::diff::diff_files;
use crate::tree::{flatten_tree, FileMap};
use crate::{Commit, Repository, Result, StorageError};
use chrono::{DateTime, Utc};

/// Predicate over repository-relative file paths.
pub type PathPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Restricts which commits [`Repository::log`] returns.
#[derive(Default)]
pub struct LogOptions {
    /// Keep commits committed at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Keep commits committed strictly before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Keep commits that touch at least one matching path.
    pub path_filter: Option<PathPredicate>,
}

impl LogOptions {
    fn in_window(&self, when: DateTime<Utc>) -> bool {
        self.since.map_or(true, |since| when >= since)
            && self.until.map_or(true, |until| when < until)
    }
}

impl Repository {
    /// Walks first-parent history from HEAD, newest first.
    ///
    /// Returns an empty list when nothing has been committed yet.
    pub fn log(&self, options: &LogOptions) -> Result<Vec<Commit>> {
        let mut next = match self.head() {
            Ok(head) => Some(head),
            Err(StorageError::NoCommits) => None,
            Err(e) => return Err(e),
        };

        let mut commits = Vec::new();
        while let Some(id) = next {
            let commit = self.commit_at(&id)?;
            next = commit.parent();

            if !options.in_window(commit.committer.time()) {
                continue;
            }
            if let Some(filter) = &options.path_filter {
                if !self.touches(&commit, filter)? {
                    continue;
                }
            }
            commits.push(commit);
        }
        Ok(commits)
    }

    fn touches(&self, commit: &Commit, filter: &PathPredicate) -> Result<bool> {
        let before = match commit.parent() {
            Some(parent) => self.files_at(&parent)?,
            None => FileMap::new(),
        };
        let after = flatten_tree(self.objects(), &commit.tree)?;
        Ok(diff_files(&before, &after)
            .iter()
            .any(|patch| filter(&patch.path)))
    }
}
