//! [`ClusterClient`] backed by the Kubernetes API.
//!
//! Every audited kind is driven through `kube`'s dynamic API so no typed
//! Antrea bindings are needed.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, PostParams};
use kube::core::{ApiResource, GroupVersionKind, TypeMeta};
use kube::Client;
use rewind_audit::{ClusterClient, ClusterError, ClusterResult, Resource, ResourceKind};

/// HTTP status the API server returns for a name that is already taken.
const CONFLICT: u16 = 409;
const NOT_FOUND: u16 = 404;

/// A cluster reached through a `kube` client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connects with the in-cluster or kubeconfig credentials.
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let resource = api_resource(kind);
        if kind.namespaced() && !namespace.is_empty() {
            Api::namespaced_with(self.client.clone(), namespace, &resource)
        } else {
            Api::all_with(self.client.clone(), &resource)
        }
    }
}

/// API coordinates of an audited kind.
pub fn api_resource(kind: ResourceKind) -> ApiResource {
    let gvk = GroupVersionKind::gvk(kind.group(), kind.version(), kind.kind());
    ApiResource::from_gvk_with_plural(&gvk, kind.plural())
}

/// Converts a stored resource into the dynamic form sent to the API server.
pub fn to_dynamic(resource: &Resource) -> ClusterResult<DynamicObject> {
    serde_json::to_value(resource)
        .and_then(serde_json::from_value)
        .map_err(|e| ClusterError::InvalidResource(e.to_string()))
}

/// Converts an object read from the API server.
///
/// List responses omit the type header on items; it is filled in from `kind`.
pub fn from_dynamic(kind: ResourceKind, mut object: DynamicObject) -> ClusterResult<Resource> {
    if object.types.is_none() {
        let resource = api_resource(kind);
        object.types = Some(TypeMeta {
            api_version: resource.api_version,
            kind: resource.kind,
        });
    }
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| ClusterError::InvalidResource(e.to_string()))
}

fn map_error(kind: ResourceKind, namespace: &str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == NOT_FOUND => ClusterError::NotFound {
            kind: kind.label().to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(response) => ClusterError::Api(response.message),
        other => ClusterError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_resources(&self, kind: ResourceKind) -> ClusterResult<Vec<Resource>> {
        let list = self
            .api(kind, "")
            .list(&ListParams::default())
            .await
            .map_err(|e| map_error(kind, "", "", e))?;
        list.items
            .into_iter()
            .map(|object| from_dynamic(kind, object))
            .collect()
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ClusterResult<Resource> {
        let object = self
            .api(kind, namespace)
            .get(name)
            .await
            .map_err(|e| map_error(kind, namespace, name, e))?;
        from_dynamic(kind, object)
    }

    async fn create_or_update(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()> {
        let (namespace, name) = (resource.namespace(), resource.name());
        let api = self.api(kind, namespace);
        let mut object = to_dynamic(resource)?;
        object.metadata.resource_version = None;

        match api.create(&PostParams::default(), &object).await {
            Ok(_) => {
                tracing::debug!(resource = %kind, namespace, name, "Created resource");
                Ok(())
            }
            Err(kube::Error::Api(response)) if response.code == CONFLICT => {
                tracing::debug!(
                    resource = %kind,
                    namespace,
                    name,
                    "Resource exists, trying update instead"
                );
                let current = api
                    .get(name)
                    .await
                    .map_err(|e| map_error(kind, namespace, name, e))?;
                object.metadata.resource_version = current.metadata.resource_version;
                api.replace(name, &PostParams::default(), &object)
                    .await
                    .map_err(|e| map_error(kind, namespace, name, e))?;
                tracing::debug!(resource = %kind, namespace, name, "Updated resource");
                Ok(())
            }
            Err(e) => Err(map_error(kind, namespace, name, e)),
        }
    }

    async fn delete_resource(&self, kind: ResourceKind, resource: &Resource) -> ClusterResult<()> {
        let (namespace, name) = (resource.namespace(), resource.name());
        self.api(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_error(kind, namespace, name, e))?;
        tracing::debug!(resource = %kind, namespace, name, "Deleted resource");
        Ok(())
    }
}
