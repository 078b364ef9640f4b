//! Input validation for tag and rollback requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rewind_types::{RollbackRequest, TagAction, TagRequest};
use serde::Serialize;
use validator::{ValidateEmail, ValidationError, ValidationErrors};

/// Tag names: git-ref-safe characters, starting alphanumeric.
pub static TAG_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9/_.-]*$").expect("Invalid regex"));

/// A commit hash in full hex form.
pub static COMMIT_SHA_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").expect("Invalid regex"));

/// Symbolic commit accepted wherever a hash is.
pub const HEAD: &str = "HEAD";

pub const MAX_TAG_LENGTH: usize = 100;
pub const MAX_AUTHOR_LENGTH: usize = 256;

/// Body of a 422 response.
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    /// Error type.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Field-level error details.
    pub details: Vec<FieldError>,
}

/// Field-level validation error.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<FieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    code: e.code.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Validation failed for field '{}'", field)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ValidationErrorResponse {
            error: "validation_error".to_string(),
            message: "Validation failed".to_string(),
            details,
        }
    }
}

fn error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into().into());
    err
}

/// Validates a tag name.
pub fn validate_tag_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(error("length", "Tag name cannot be empty"));
    }
    if name.len() > MAX_TAG_LENGTH {
        return Err(error(
            "length",
            format!("Tag name must be at most {} characters", MAX_TAG_LENGTH),
        ));
    }
    if !TAG_NAME_REGEX.is_match(name) {
        return Err(error("pattern", "Invalid tag name format"));
    }
    if name.contains("..") || name.ends_with('/') || name.ends_with('.') || name.ends_with(".lock")
    {
        return Err(error(
            "git_restriction",
            "Tag name contains invalid Git sequences",
        ));
    }
    Ok(())
}

/// Validates a commit reference: a full hex hash or `HEAD`.
pub fn validate_commit_sha(sha: &str) -> Result<(), ValidationError> {
    if sha == HEAD || COMMIT_SHA_REGEX.is_match(sha) {
        Ok(())
    } else {
        Err(error("pattern", "Commit must be a 40 character hex hash or HEAD"))
    }
}

/// Checks a `POST /tag` body.
pub fn validate_tag_request(request: &TagRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Err(e) = validate_tag_name(&request.tag) {
        errors.add("tag", e);
    }
    if request.action == TagAction::Create {
        match request.sha.as_deref() {
            Some(sha) => {
                if let Err(e) = validate_commit_sha(sha) {
                    errors.add("sha", e);
                }
            }
            None => errors.add("sha", error("required", "Tag creation needs a commit")),
        }
        if let Some(author) = request.author.as_deref() {
            if author.len() > MAX_AUTHOR_LENGTH {
                errors.add(
                    "author",
                    error(
                        "length",
                        format!("Author must be at most {} characters", MAX_AUTHOR_LENGTH),
                    ),
                );
            }
        }
        if let Some(email) = request.email.as_deref() {
            if !email.validate_email() {
                errors.add("email", error("email", "Invalid email address"));
            }
        }
    }
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks a `POST /rollback` body.
pub fn validate_rollback_request(request: &RollbackRequest) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if request.target().is_none() {
        errors.add(
            "target",
            error("exclusive", "Exactly one of tag and sha must be set"),
        );
    }
    if let Some(sha) = request.sha.as_deref().filter(|s| !s.is_empty()) {
        if let Err(e) = validate_commit_sha(sha) {
            errors.add("sha", e);
        }
    }
    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
