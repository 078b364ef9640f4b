//! Audited resource kinds and the stored resource document.
//!
//! Every audited resource belongs to one [`ResourceKind`]. The kind fixes the
//! category directory a resource is stored under, the label used in commit
//! messages and the API coordinates used to talk to the cluster.

use crate::{AuditError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Annotation written by `kubectl apply` that must never be stored.
pub const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

const K8S_GROUP: &str = "networking.k8s.io";
const ANTREA_GROUP: &str = "crd.antrea.io";

/// The closed set of audited resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// `networking.k8s.io` NetworkPolicy.
    K8sNetworkPolicy,
    /// Antrea namespaced NetworkPolicy.
    AntreaNetworkPolicy,
    /// Antrea ClusterNetworkPolicy.
    AntreaClusterNetworkPolicy,
    /// Antrea Tier.
    Tier,
}

impl ResourceKind {
    /// Every audited kind, in seeding order.
    pub const ALL: [ResourceKind; 4] = [
        Self::K8sNetworkPolicy,
        Self::AntreaNetworkPolicy,
        Self::AntreaClusterNetworkPolicy,
        Self::Tier,
    ];

    /// Looks up a kind by audit `objectRef` resource plural and API group.
    pub fn from_object_ref(resource: &str, api_group: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.plural() == resource && kind.group() == api_group)
    }

    /// Looks up a kind by its category directory name.
    pub fn from_directory(directory: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.directory() == directory)
    }

    /// Resolves `apiVersion` and `kind` read from a stored document.
    ///
    /// The API version is checked first, so a document with both fields
    /// unknown reports [`AuditError::UnknownApiVersion`].
    pub fn from_type_meta(api_version: &str, kind: &str) -> Result<Self> {
        let group = match api_version {
            "networking.k8s.io/v1" => K8S_GROUP,
            "crd.antrea.io/v1alpha1" | "crd.antrea.io/v1beta1" => ANTREA_GROUP,
            other => return Err(AuditError::UnknownApiVersion(other.to_string())),
        };
        Self::ALL
            .into_iter()
            .find(|k| k.group() == group && k.kind() == kind)
            .ok_or_else(|| AuditError::UnknownKind(format!("{kind} in {api_version}")))
    }

    /// API group.
    pub fn group(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy => K8S_GROUP,
            _ => ANTREA_GROUP,
        }
    }

    /// Version used when listing from the cluster.
    pub fn version(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy => "v1",
            _ => "v1alpha1",
        }
    }

    /// `kind` field value.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy | Self::AntreaNetworkPolicy => "NetworkPolicy",
            Self::AntreaClusterNetworkPolicy => "ClusterNetworkPolicy",
            Self::Tier => "Tier",
        }
    }

    /// Lowercase plural resource name used in API paths and audit events.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy | Self::AntreaNetworkPolicy => "networkpolicies",
            Self::AntreaClusterNetworkPolicy => "clusternetworkpolicies",
            Self::Tier => "tiers",
        }
    }

    /// Category directory in the repository.
    pub fn directory(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy => "k8s-policies",
            Self::AntreaNetworkPolicy => "antrea-policies",
            Self::AntreaClusterNetworkPolicy => "antrea-cluster-policies",
            Self::Tier => "antrea-tiers",
        }
    }

    /// Human label used in commit messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::K8sNetworkPolicy => "K8s network policy",
            Self::AntreaNetworkPolicy => "Antrea network policy",
            Self::AntreaClusterNetworkPolicy => "Antrea cluster network policy",
            Self::Tier => "Antrea tier",
        }
    }

    /// True if resources of this kind live in a namespace.
    pub fn namespaced(&self) -> bool {
        matches!(self, Self::K8sNetworkPolicy | Self::AntreaNetworkPolicy)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Type header read before full decoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
}

/// A stored resource: type header, metadata and spec.
///
/// Status and any other top-level fields are dropped on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// `group/version`.
    pub api_version: String,
    /// Kind name.
    pub kind: String,
    /// Object metadata.
    #[serde(default)]
    pub metadata: ObjectMeta,
    /// Desired state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<serde_json::Value>,
}

impl Resource {
    /// Decodes a resource from an audit event's response object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes a stored YAML document and resolves its kind.
    pub fn from_yaml(data: &[u8]) -> Result<(ResourceKind, Self)> {
        let header: TypeMeta = serde_yaml::from_slice(data)?;
        let kind = ResourceKind::from_type_meta(&header.api_version, &header.kind)?;
        Ok((kind, serde_yaml::from_slice(data)?))
    }

    /// Renders the resource as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Resource namespace, empty when cluster-scoped.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Removes server-assigned fields so the document can be re-applied.
    pub fn sanitize(&mut self) {
        let meta = &mut self.metadata;
        meta.uid = None;
        meta.generation = None;
        meta.managed_fields = None;
        meta.creation_timestamp = None;
        if let Some(annotations) = meta.annotations.as_mut() {
            annotations.remove(LAST_APPLIED_ANNOTATION);
            if annotations.is_empty() {
                meta.annotations = None;
            }
        }
    }

    /// Sanitized copy of the resource.
    pub fn sanitized(mut self) -> Self {
        self.sanitize();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn policy_json() -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "NetworkPolicy",
            "metadata": {
                "name": "allow-web",
                "namespace": "ns1",
                "uid": "3f1c",
                "generation": 4,
                "resourceVersion": "812",
                "creationTimestamp": "2024-05-01T10:00:00Z",
                "labels": {"app": "web"},
                "annotations": {
                    LAST_APPLIED_ANNOTATION: "{}",
                    "team": "net"
                },
                "managedFields": [{"manager": "kubectl", "operation": "Update"}]
            },
            "spec": {"podSelector": {}, "policyTypes": ["Ingress"]},
            "status": {}
        })
    }

    #[test]
    fn test_kind_table() {
        assert_eq!(
            ResourceKind::from_object_ref("networkpolicies", "crd.antrea.io"),
            Some(ResourceKind::AntreaNetworkPolicy)
        );
        assert_eq!(
            ResourceKind::from_object_ref("networkpolicies", "networking.k8s.io"),
            Some(ResourceKind::K8sNetworkPolicy)
        );
        assert_eq!(ResourceKind::from_object_ref("pods", ""), None);
        assert_eq!(
            ResourceKind::from_directory("antrea-tiers"),
            Some(ResourceKind::Tier)
        );

        let dirs: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.directory()).collect();
        let mut unique = dirs.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), dirs.len());
    }

    #[test]
    fn test_from_type_meta_checks_version_first() {
        assert_eq!(
            ResourceKind::from_type_meta("crd.antrea.io/v1alpha1", "Tier").unwrap(),
            ResourceKind::Tier
        );
        assert!(matches!(
            ResourceKind::from_type_meta("v1", "Pod"),
            Err(AuditError::UnknownApiVersion(_))
        ));
        assert!(matches!(
            ResourceKind::from_type_meta("networking.k8s.io/v1", "Ingress"),
            Err(AuditError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_sanitize_strips_server_fields() {
        let resource = Resource::from_json(policy_json()).unwrap().sanitized();
        let meta = &resource.metadata;
        assert_eq!(meta.uid, None);
        assert_eq!(meta.generation, None);
        assert_eq!(meta.managed_fields, None);
        assert_eq!(meta.creation_timestamp, None);
        assert_eq!(meta.resource_version.as_deref(), Some("812"));

        let annotations = meta.annotations.clone().unwrap();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations["team"], "net");

        let yaml = resource.to_yaml().unwrap();
        assert!(!yaml.contains("status"));
        assert!(!yaml.contains("uid"));
        assert!(yaml.starts_with("apiVersion: networking.k8s.io/v1\nkind: NetworkPolicy\n"));
    }

    #[test]
    fn test_yaml_roundtrip_resolves_kind() {
        let resource = Resource::from_json(policy_json()).unwrap().sanitized();
        let yaml = resource.to_yaml().unwrap();
        let (kind, decoded) = Resource::from_yaml(yaml.as_bytes()).unwrap();
        assert_eq!(kind, ResourceKind::K8sNetworkPolicy);
        assert_eq!(decoded, resource);
        assert_eq!(decoded.name(), "allow-web");
        assert_eq!(decoded.namespace(), "ns1");
    }

    #[test]
    fn test_from_yaml_unknown_version() {
        let err = Resource::from_yaml(b"apiVersion: apps/v1\nkind: Deployment\n").unwrap_err();
        assert!(matches!(err, AuditError::UnknownApiVersion(v) if v == "apps/v1"));
    }

    prop_compose! {
        fn arb_resource()(
            name in "[a-z][a-z0-9-]{0,12}",
            namespace in proptest::option::of("[a-z]{1,8}"),
            uid in proptest::option::of("[a-f0-9]{8}"),
            generation in proptest::option::of(0i64..100),
            annotations in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9 ]{0,10}", 0..3),
            last_applied in any::<bool>(),
        ) -> Resource {
            let mut annotations: BTreeMap<String, String> = annotations;
            if last_applied {
                annotations.insert(LAST_APPLIED_ANNOTATION.to_string(), "{}".to_string());
            }
            Resource {
                api_version: "crd.antrea.io/v1alpha1".to_string(),
                kind: "NetworkPolicy".to_string(),
                metadata: ObjectMeta {
                    name: Some(name),
                    namespace,
                    uid,
                    generation,
                    annotations: if annotations.is_empty() { None } else { Some(annotations) },
                    ..Default::default()
                },
                spec: Some(serde_json::json!({"priority": 5})),
            }
        }
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(resource in arb_resource()) {
            let once = resource.sanitized();
            let yaml = once.to_yaml().unwrap();
            let (_, decoded) = Resource::from_yaml(yaml.as_bytes()).unwrap();
            let twice = decoded.sanitized();
            prop_assert_eq!(&twice, &once);
            prop_assert_eq!(twice.to_yaml().unwrap(), yaml);
        }
    }
}
