//! Mapping between resources and repository paths.

use crate::resource::{Resource, ResourceKind};
use std::fmt;

const FILE_EXTENSION: &str = ".yaml";

/// Identifies one cluster resource: kind, namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceDescriptor {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Namespace, empty for cluster-scoped resources.
    pub namespace: String,
    /// Resource name.
    pub name: String,
}

impl ResourceDescriptor {
    /// Creates a descriptor.
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Builds the descriptor of a decoded resource.
    pub fn of(kind: ResourceKind, resource: &Resource) -> Self {
        Self::new(kind, resource.namespace(), resource.name())
    }

    /// Relative path: `<category>/<namespace>/<name>.yaml`, or
    /// `<category>/<name>.yaml` without a namespace.
    pub fn path(&self) -> String {
        if self.namespace.is_empty() {
            format!("{}/{}{FILE_EXTENSION}", self.kind.directory(), self.name)
        } else {
            format!(
                "{}/{}/{}{FILE_EXTENSION}",
                self.kind.directory(),
                self.namespace,
                self.name
            )
        }
    }

    /// Parses a repository path back into a descriptor.
    pub fn from_path(path: &str) -> Option<Self> {
        let parts: Vec<&str> = path.split('/').collect();
        let (dir, namespace, file) = match parts.as_slice() {
            [dir, file] => (*dir, "", *file),
            [dir, namespace, file] => (*dir, *namespace, *file),
            _ => return None,
        };
        let kind = ResourceKind::from_directory(dir)?;
        let name = file.strip_suffix(FILE_EXTENSION)?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(kind, namespace, name))
    }
}

impl fmt::Display for ResourceDescriptor {
    /// Commit message subject, e.g. `K8s network policy ns1/allow-web`.
    ///
    /// Cluster-scoped resources keep the separator: `Antrea tier /gold`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind.label(), self.namespace, self.name)
    }
}

/// Path predicate over category, namespace and name components.
///
/// Unset components match anything. A namespace filter never matches a
/// cluster-scoped path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    /// Category to match.
    pub kind: Option<ResourceKind>,
    /// Namespace to match.
    pub namespace: Option<String>,
    /// Resource name to match.
    pub name: Option<String>,
}

impl PathFilter {
    /// True if no component is constrained.
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && self.namespace.is_none() && self.name.is_none()
    }

    /// Tests a repository path.
    pub fn matches(&self, path: &str) -> bool {
        let Some(descriptor) = ResourceDescriptor::from_path(path) else {
            return false;
        };
        self.kind.map_or(true, |kind| kind == descriptor.kind)
            && self
                .namespace
                .as_deref()
                .map_or(true, |ns| ns == descriptor.namespace)
            && self
                .name
                .as_deref()
                .map_or(true, |name| name == descriptor.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_paths() {
        let policy = ResourceDescriptor::new(ResourceKind::K8sNetworkPolicy, "ns1", "a");
        assert_eq!(policy.path(), "k8s-policies/ns1/a.yaml");
        assert_eq!(policy.to_string(), "K8s network policy ns1/a");

        let tier = ResourceDescriptor::new(ResourceKind::Tier, "", "gold");
        assert_eq!(tier.path(), "antrea-tiers/gold.yaml");
        assert_eq!(tier.to_string(), "Antrea tier /gold");

        assert_eq!(ResourceDescriptor::from_path(&policy.path()), Some(policy));
        assert_eq!(ResourceDescriptor::from_path(&tier.path()), Some(tier));
        assert_eq!(ResourceDescriptor::from_path("other/ns/a.yaml"), None);
        assert_eq!(ResourceDescriptor::from_path("k8s-policies/ns/a.json"), None);
    }

    #[test]
    fn test_filter_components() {
        let in_ns1 = PathFilter {
            namespace: Some("ns1".into()),
            ..Default::default()
        };
        assert!(in_ns1.matches("k8s-policies/ns1/a.yaml"));
        assert!(in_ns1.matches("antrea-policies/ns1/b.yaml"));
        assert!(!in_ns1.matches("antrea-policies/ns10/b.yaml"));
        assert!(!in_ns1.matches("antrea-tiers/ns1.yaml"));

        let named = PathFilter {
            kind: Some(ResourceKind::AntreaNetworkPolicy),
            name: Some("b".into()),
            ..Default::default()
        };
        assert!(named.matches("antrea-policies/ns2/b.yaml"));
        assert!(!named.matches("k8s-policies/ns2/b.yaml"));
        assert!(!named.matches("antrea-policies/ns2/bb.yaml"));

        assert!(PathFilter::default().is_empty());
        assert!(PathFilter::default().matches("antrea-tiers/gold.yaml"));
    }

    fn arb_descriptor() -> impl Strategy<Value = ResourceDescriptor> {
        (
            proptest::sample::select(ResourceKind::ALL.to_vec()),
            "[a-z][a-z0-9-]{0,8}",
            "[a-z][a-z0-9.-]{0,12}",
        )
            .prop_map(|(kind, namespace, name)| {
                let namespace = if kind.namespaced() { namespace } else { String::new() };
                ResourceDescriptor::new(kind, namespace, name)
            })
    }

    proptest! {
        #[test]
        fn prop_path_is_deterministic_and_injective(
            a in arb_descriptor(),
            b in arb_descriptor(),
        ) {
            prop_assert_eq!(a.path(), a.clone().path());
            prop_assert_eq!(ResourceDescriptor::from_path(&a.path()), Some(a.clone()));
            if a != b {
                prop_assert_ne!(a.path(), b.path());
            }
        }
    }
}
