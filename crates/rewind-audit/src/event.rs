//! Kubernetes audit events (`audit.k8s.io/v1`), decoded leniently.

use crate::Result;
use serde::Deserialize;

/// Stage at which an event describes a completed request.
pub const STAGE_RESPONSE_COMPLETE: &str = "ResponseComplete";

/// Response status reported for rejected requests.
pub const STATUS_FAILURE: &str = "Failure";

const BYTE_ORDER_MARK: &[u8] = b"\xef\xbb\xbf";

/// A batch of audit events as delivered by the audit webhook backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventList {
    /// Events in delivery order.
    #[serde(default)]
    pub items: Vec<Event>,
}

/// One audit event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Request verb.
    #[serde(default)]
    pub verb: String,
    /// Stage of the request the event was emitted at.
    #[serde(default)]
    pub stage: String,
    /// Authenticated user.
    #[serde(default)]
    pub user: UserInfo,
    /// Target object.
    #[serde(default)]
    pub object_ref: Option<ObjectReference>,
    /// Response status, present for completed requests.
    #[serde(default)]
    pub response_status: Option<ResponseStatus>,
    /// Object returned by the API server.
    #[serde(default)]
    pub response_object: Option<serde_json::Value>,
}

/// Identity that issued the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    /// User name.
    #[serde(default)]
    pub username: String,
    /// User UID.
    #[serde(default)]
    pub uid: String,
}

/// Reference to the object a request acted on.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Plural resource name.
    #[serde(default)]
    pub resource: String,
    /// Namespace, empty for cluster-scoped objects.
    #[serde(default)]
    pub namespace: String,
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// API group, empty for the core group.
    #[serde(default)]
    pub api_group: String,
}

/// Outcome of the audited request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseStatus {
    /// `Success` or `Failure`; often omitted on success.
    #[serde(default)]
    pub status: String,
    /// HTTP status code.
    #[serde(default)]
    pub code: i32,
}

/// What an event does to the stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// The resource was created.
    Create,
    /// The resource was patched or replaced.
    Update,
    /// The resource was deleted.
    Delete,
    /// Any other verb; ignored.
    Other,
}

impl Verb {
    /// Maps an audit verb.
    pub fn parse(verb: &str) -> Self {
        match verb {
            "create" => Self::Create,
            "patch" | "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Other,
        }
    }
}

impl Event {
    /// Why this event must be ignored, if it must.
    pub fn skip_reason(&self, service_account: &str) -> Option<&'static str> {
        if self.stage != STAGE_RESPONSE_COMPLETE {
            return Some("stage is not ResponseComplete");
        }
        if self
            .response_status
            .as_ref()
            .is_some_and(|s| s.status == STATUS_FAILURE)
        {
            return Some("request failed");
        }
        if self.user.username == service_account {
            return Some("produced by rollback");
        }
        None
    }

    /// Email recorded as the commit author.
    pub fn author_email(&self) -> String {
        format!("{}+{}@audit.antrea.io", self.user.username, self.user.uid)
    }
}

/// Decodes an event list, tolerating a leading UTF-8 byte-order mark.
pub fn decode_event_list(raw: &[u8]) -> Result<EventList> {
    let raw = raw.strip_prefix(BYTE_ORDER_MARK).unwrap_or(raw);
    Ok(serde_json::from_slice(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: &str = r#"{
        "kind": "EventList",
        "apiVersion": "audit.k8s.io/v1",
        "items": [{
            "level": "RequestResponse",
            "auditID": "7c8f",
            "stage": "ResponseComplete",
            "verb": "create",
            "user": {"username": "alice", "uid": "u-1", "groups": ["system:authenticated"]},
            "objectRef": {
                "resource": "networkpolicies",
                "namespace": "ns1",
                "name": "a",
                "apiGroup": "networking.k8s.io",
                "apiVersion": "v1"
            },
            "responseStatus": {"metadata": {}, "code": 201},
            "responseObject": {"kind": "NetworkPolicy"}
        }]
    }"#;

    #[test]
    fn test_decode_with_bom() {
        let mut raw = BYTE_ORDER_MARK.to_vec();
        raw.extend_from_slice(BATCH.as_bytes());
        let list = decode_event_list(&raw).unwrap();
        assert_eq!(list.items.len(), 1);

        let event = &list.items[0];
        assert_eq!(Verb::parse(&event.verb), Verb::Create);
        assert_eq!(event.author_email(), "alice+u-1@audit.antrea.io");
        assert_eq!(event.object_ref.as_ref().unwrap().api_group, "networking.k8s.io");
        assert_eq!(event.skip_reason("system:serviceaccount:kube-system:antrea-audit"), None);
        assert!(event.skip_reason("alice").is_some());
    }

    #[test]
    fn test_skip_rules() {
        let mut event = Event {
            stage: "RequestReceived".into(),
            ..Default::default()
        };
        assert!(event.skip_reason("sa").is_some());

        event.stage = STAGE_RESPONSE_COMPLETE.into();
        event.response_status = Some(ResponseStatus {
            status: STATUS_FAILURE.into(),
            code: 409,
        });
        assert!(event.skip_reason("sa").is_some());

        event.response_status = None;
        assert_eq!(event.skip_reason("sa"), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_event_list(b"not json").is_err());
        assert!(decode_event_list(b"{}").unwrap().items.is_empty());
    }

    #[test]
    fn test_verbs() {
        assert_eq!(Verb::parse("patch"), Verb::Update);
        assert_eq!(Verb::parse("update"), Verb::Update);
        assert_eq!(Verb::parse("delete"), Verb::Delete);
        assert_eq!(Verb::parse("get"), Verb::Other);
    }
}
