//! Applies audit event batches to the repository.

use crate::event::{decode_event_list, Event, Verb};
use crate::layout::ResourceDescriptor;
use crate::repo::RepoState;
use crate::resource::{Resource, ResourceKind};
use crate::{AuditError, Result};
use rewind_storage::{ObjectId, Repository, Signature};

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Commits created, in order.
    pub commits: Vec<ObjectId>,
    /// Events ignored.
    pub skipped: usize,
}

impl RepoState {
    /// Decodes and applies a batch of audit events.
    ///
    /// Each applied event produces exactly one commit. The first failure
    /// stops the batch; commits made before it stay in history.
    pub async fn handle_event_list(&self, raw: &[u8]) -> Result<BatchOutcome> {
        let list = decode_event_list(raw)?;
        let inner = self.lock().await;

        let mut outcome = BatchOutcome::default();
        for event in &list.items {
            if let Some(reason) = event.skip_reason(self.service_account()) {
                tracing::debug!(user = %event.user.username, reason, "Audit event skipped");
                outcome.skipped += 1;
                continue;
            }
            if inner.rollback_in_progress {
                tracing::warn!(user = %event.user.username, "Audit batch refused during rollback");
                return Err(AuditError::RollbackInProgress);
            }
            match apply_event(&inner.store, event)? {
                Some(commit) => outcome.commits.push(commit),
                None => outcome.skipped += 1,
            }
        }
        Ok(outcome)
    }
}

/// Applies one event, returning the commit it produced.
fn apply_event(store: &Repository, event: &Event) -> Result<Option<ObjectId>> {
    let verb = Verb::parse(&event.verb);
    if verb == Verb::Other {
        tracing::debug!(verb = %event.verb, "Audit event skipped, unsupported verb");
        return Ok(None);
    }
    let Some(object_ref) = &event.object_ref else {
        tracing::debug!("Audit event skipped, no object reference");
        return Ok(None);
    };
    let Some(kind) = ResourceKind::from_object_ref(&object_ref.resource, &object_ref.api_group)
    else {
        tracing::debug!(
            resource = %object_ref.resource,
            group = %object_ref.api_group,
            "Audit event skipped, resource is not audited"
        );
        return Ok(None);
    };

    let descriptor = ResourceDescriptor::new(kind, &object_ref.namespace, &object_ref.name);
    let path = descriptor.path();
    let message = match verb {
        Verb::Create | Verb::Update => {
            let object = event
                .response_object
                .clone()
                .ok_or_else(|| AuditError::MissingResponseObject(descriptor.to_string()))?;
            let resource = Resource::from_json(object)?.sanitized();
            store.write_file(&path, resource.to_yaml()?.as_bytes())?;
            if verb == Verb::Create {
                format!("Created {descriptor}")
            } else {
                format!("Updated {descriptor}")
            }
        }
        Verb::Delete => {
            store.delete_file(&path)?;
            format!("Deleted {descriptor}")
        }
        Verb::Other => return Ok(None),
    };

    let author = Signature::now(event.user.username.clone(), event.author_email());
    let commit = store.commit(&author, &message)?;
    tracing::info!(
        commit = %commit,
        path = %path,
        user = %event.user.username,
        "{message}"
    );
    Ok(Some(commit))
}
