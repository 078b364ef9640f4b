//! History queries by author, time window and resource.

use crate::layout::PathFilter;
use crate::repo::RepoState;
use crate::resource::ResourceKind;
use crate::{AuditError, Result};
use chrono::{DateTime, Utc};
use rewind_storage::{Commit, LogOptions, PathPredicate};

/// Filters for [`RepoState::filter_commits`]. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitQuery {
    /// Exact author name.
    pub author: Option<String>,
    /// Inclusive lower bound on commit time.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on commit time.
    pub until: Option<DateTime<Utc>>,
    /// Category directory, e.g. `antrea-policies`.
    pub resource: Option<String>,
    /// Namespace.
    pub namespace: Option<String>,
    /// Resource name.
    pub name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl CommitQuery {
    /// Builds the path predicate, or `None` when no resource filter is set.
    pub fn path_filter(&self) -> Result<Option<PathFilter>> {
        let kind = match non_empty(&self.resource) {
            Some(dir) => Some(ResourceKind::from_directory(dir).ok_or_else(|| {
                AuditError::InvalidQuery(format!("unknown resource category {dir:?}"))
            })?),
            None => None,
        };
        let filter = PathFilter {
            kind,
            namespace: non_empty(&self.namespace).map(str::to_string),
            name: non_empty(&self.name).map(str::to_string),
        };
        Ok((!filter.is_empty()).then_some(filter))
    }
}

impl RepoState {
    /// Lists matching commits, newest first. Never modifies the repository.
    pub async fn filter_commits(&self, query: &CommitQuery) -> Result<Vec<Commit>> {
        if let (Some(since), Some(until)) = (query.since, query.until) {
            if since > until {
                return Err(AuditError::InvalidQuery(
                    "since is later than until".to_string(),
                ));
            }
        }
        let options = LogOptions {
            since: query.since,
            until: query.until,
            path_filter: query.path_filter()?.map(|filter| -> PathPredicate {
                Box::new(move |path: &str| filter.matches(path))
            }),
        };

        let inner = self.lock().await;
        let commits = inner.store.log(&options)?;
        let author = non_empty(&query.author);
        Ok(commits
            .into_iter()
            .filter(|c| author.map_or(true, |a| c.author.name == a))
            .collect())
    }
}
