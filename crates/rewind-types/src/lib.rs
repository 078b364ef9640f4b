//! Wire types shared by the `rewind-node` HTTP API and the `rewind` CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Email used when a tag request carries none.
pub const DEFAULT_TAG_EMAIL: &str = "default@audit.io";

/// Author used when a tag request carries none.
pub const DEFAULT_TAG_AUTHOR: &str = "no-author";

/// One entry of the change history returned by `GET /changes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Commit hash (hex).
    pub sha: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Commit message.
    pub message: String,
}

/// Whether a tag request creates or deletes a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagAction {
    /// Create a new tag.
    Create,
    /// Delete an existing tag.
    Delete,
}

/// Body of `POST /tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequest {
    /// Create or delete.
    #[serde(rename = "type")]
    pub action: TagAction,
    /// Tag name.
    pub tag: String,
    /// Commit to tag; required for create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    /// Tagger name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Tagger email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl TagRequest {
    /// Builds a create request.
    pub fn create(tag: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            action: TagAction::Create,
            tag: tag.into(),
            sha: Some(sha.into()),
            author: None,
            email: None,
        }
    }

    /// Builds a delete request.
    pub fn delete(tag: impl Into<String>) -> Self {
        Self {
            action: TagAction::Delete,
            tag: tag.into(),
            sha: None,
            author: None,
            email: None,
        }
    }
}

/// Body of `POST /rollback`. Exactly one of `tag` and `sha` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// Roll back to the commit this tag points at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Roll back to this commit hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Rollback target decoded from a [`RollbackRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget<'a> {
    /// A tag name.
    Tag(&'a str),
    /// A commit hash.
    Sha(&'a str),
}

impl RollbackRequest {
    /// Returns the target, or `None` unless exactly one non-empty field is set.
    pub fn target(&self) -> Option<RollbackTarget<'_>> {
        let tag = self.tag.as_deref().filter(|t| !t.is_empty());
        let sha = self.sha.as_deref().filter(|s| !s.is_empty());
        match (tag, sha) {
            (Some(tag), None) => Some(RollbackTarget::Tag(tag)),
            (None, Some(sha)) => Some(RollbackTarget::Sha(sha)),
            _ => None,
        }
    }
}

/// Response of tag and rollback endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResponse {
    /// Human-readable result.
    pub message: String,
    /// Commit involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// One entry of `GET /tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInfo {
    /// Tag name.
    pub tag: String,
    /// Commit the tag points at.
    pub sha: String,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_request_wire_format() {
        let request: TagRequest = serde_json::from_str(
            r#"{"type":"create","tag":"good","sha":"abc","author":"alice","email":"a@x.io"}"#,
        )
        .unwrap();
        assert_eq!(request.action, TagAction::Create);
        assert_eq!(request.sha.as_deref(), Some("abc"));

        let json = serde_json::to_value(TagRequest::delete("good")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "delete", "tag": "good"}));
    }

    #[test]
    fn test_rollback_target() {
        let by_tag = RollbackRequest {
            tag: Some("good".into()),
            sha: None,
        };
        assert_eq!(by_tag.target(), Some(RollbackTarget::Tag("good")));

        let by_sha = RollbackRequest {
            tag: Some(String::new()),
            sha: Some("abc".into()),
        };
        assert_eq!(by_sha.target(), Some(RollbackTarget::Sha("abc")));

        assert_eq!(RollbackRequest::default().target(), None);
        let both = RollbackRequest {
            tag: Some("good".into()),
            sha: Some("abc".into()),
        };
        assert_eq!(both.target(), None);
    }
}
