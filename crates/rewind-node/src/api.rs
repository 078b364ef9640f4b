//! HTTP API for the Rewind node.
//!
//! ## Endpoints
//!
//! - `POST /` and `POST /events` - Audit webhook receiving an `EventList`
//! - `GET /changes` - Change history filtered by author, time and resource
//! - `POST /tag` - Create or delete a tag
//! - `GET /tags` - List tags
//! - `POST /rollback` - Roll back to a tag or commit
//! - `POST /rollback/recover` - Clear a failed rollback
//! - `GET /health` - Liveness

use crate::validation::{self, ValidationErrorResponse, HEAD};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use rewind_audit::{AuditError, CommitQuery, RepoState};
use rewind_storage::{Commit, Signature, StorageError};
use rewind_types::{
    ChangeSummary, ErrorResponse, OperationResponse, RollbackRequest, RollbackTarget, TagAction,
    TagInfo, TagRequest, DEFAULT_TAG_AUTHOR, DEFAULT_TAG_EMAIL,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use validator::ValidationErrors;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The audit repository.
    pub repo: Arc<RepoState>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Audit(e) => audit_status(e),
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

fn audit_status(error: &AuditError) -> StatusCode {
    match error {
        AuditError::RollbackInProgress => StatusCode::SERVICE_UNAVAILABLE,
        AuditError::TagExists(_) | AuditError::Storage(StorageError::TagExists(_)) => {
            StatusCode::CONFLICT
        }
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        AuditError::InvalidName(_)
        | AuditError::InvalidQuery(_)
        | AuditError::Decode(_)
        | AuditError::MissingResponseObject(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        match self {
            ApiError::Validation(errors) => ValidationErrorResponse::from(errors).into_response(),
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

/// Reply to an accepted audit batch.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsResponse {
    /// Commits created, oldest first.
    pub commits: Vec<String>,
    /// Events that needed no commit.
    pub skipped: usize,
}

/// Query string of `GET /changes`.
#[derive(Debug, Default, Deserialize)]
pub struct ChangesParams {
    pub author: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub resource: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_time(field: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| ApiError::BadRequest(format!("{field}: unrecognized time {value:?}")))
}

fn optional_time(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| parse_time(field, v.trim()))
        .transpose()
}

impl ChangesParams {
    fn into_query(self) -> Result<CommitQuery, ApiError> {
        Ok(CommitQuery {
            since: optional_time("since", self.since.as_deref())?,
            until: optional_time("until", self.until.as_deref())?,
            author: self.author,
            resource: self.resource,
            namespace: self.namespace,
            name: self.name,
        })
    }
}

fn summarize(commit: Commit) -> ChangeSummary {
    ChangeSummary {
        sha: commit.id.to_hex(),
        timestamp: commit.author.time(),
        author: commit.author.name,
        email: commit.author.email,
        message: commit.message.trim_end().to_string(),
    }
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Audit webhook
        .route("/", post(receive_events))
        .route("/events", post(receive_events))
        // History and tags
        .route("/changes", get(list_changes))
        .route("/tag", post(tag))
        .route("/tags", get(list_tags))
        // Rollback
        .route("/rollback", post(rollback))
        .route("/rollback/recover", post(recover))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.repo.mode().to_string(),
    }))
}

/// Applies a batch of audit events.
async fn receive_events(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.repo.handle_event_list(&body).await?;
    Ok(Json(EventsResponse {
        commits: outcome.commits.iter().map(|id| id.to_hex()).collect(),
        skipped: outcome.skipped,
    }))
}

/// Lists changes, newest first.
async fn list_changes(
    State(state): State<AppState>,
    Query(params): Query<ChangesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_query()?;
    let commits = state.repo.filter_commits(&query).await?;
    Ok(Json(
        commits.into_iter().map(summarize).collect::<Vec<_>>(),
    ))
}

/// Creates or deletes a tag.
async fn tag(
    State(state): State<AppState>,
    Json(request): Json<TagRequest>,
) -> Result<Response, ApiError> {
    validation::validate_tag_request(&request)?;

    match request.action {
        TagAction::Create => {
            let sha = match request.sha.as_deref() {
                Some(HEAD) | None => state.repo.head().await?.to_hex(),
                Some(sha) => sha.to_string(),
            };
            let tagger = Signature::now(
                request.author.as_deref().unwrap_or(DEFAULT_TAG_AUTHOR),
                request.email.as_deref().unwrap_or(DEFAULT_TAG_EMAIL),
            );
            let commit = state.repo.tag_commit(&sha, &request.tag, &tagger).await?;
            Ok((
                StatusCode::CREATED,
                Json(OperationResponse {
                    message: format!("Tag {} created", request.tag),
                    commit: Some(commit.to_hex()),
                }),
            )
                .into_response())
        }
        TagAction::Delete => {
            state.repo.remove_tag(&request.tag).await?;
            Ok(Json(OperationResponse {
                message: format!("Tag {} deleted", request.tag),
                commit: None,
            })
            .into_response())
        }
    }
}

/// Lists tags with their commits.
async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tags = state.repo.list_tags().await?;
    Ok(Json(
        tags.into_iter()
            .map(|(tag, id)| TagInfo {
                tag,
                sha: id.to_hex(),
            })
            .collect::<Vec<_>>(),
    ))
}

/// Rolls the cluster and repository back to a tag or commit.
async fn rollback(
    State(state): State<AppState>,
    Json(request): Json<RollbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validation::validate_rollback_request(&request)?;

    let (commit, target) = match request.target() {
        Some(RollbackTarget::Tag(tag)) => (state.repo.rollback_to_tag(tag).await?, tag),
        Some(RollbackTarget::Sha(HEAD)) => {
            let head = state.repo.head().await?.to_hex();
            (state.repo.rollback_to_hash(&head).await?, HEAD)
        }
        Some(RollbackTarget::Sha(sha)) => (state.repo.rollback_to_hash(sha).await?, sha),
        None => return Err(ApiError::BadRequest("no rollback target".into())),
    };
    Ok(Json(OperationResponse {
        message: format!("Rollback to {target} successful"),
        commit: Some(commit.to_hex()),
    }))
}

/// Resets the working tree after a failed rollback.
async fn recover(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let head = state.repo.recover().await?;
    Ok(Json(OperationResponse {
        message: "Recovered; audits are accepted again".to_string(),
        commit: Some(head.to_hex()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        let rfc = parse_time("since", "2024-05-01T10:00:00+02:00").unwrap();
        assert_eq!(rfc.to_rfc3339(), "2024-05-01T08:00:00+00:00");

        let date = parse_time("until", "2024-05-01").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-05-01T00:00:00+00:00");

        assert!(matches!(
            parse_time("since", "yesterday"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: AuditError| ApiError::from(e).status();
        assert_eq!(status(AuditError::RollbackInProgress), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status(AuditError::TagExists("t".into())), StatusCode::CONFLICT);
        assert_eq!(status(AuditError::TagNotFound("t".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AuditError::CommitNotFound("c".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AuditError::InvalidQuery("q".into())), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AuditError::UnknownKind("Pod".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_blank_times_are_unset() {
        let params = ChangesParams {
            since: Some(" ".into()),
            author: Some("alice".into()),
            ..Default::default()
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.since, None);
        assert_eq!(query.author.as_deref(), Some("alice"));
    }
}
