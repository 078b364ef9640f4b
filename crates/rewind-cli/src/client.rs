//! HTTP client for a running `rewind-node`.

use reqwest::{Client, RequestBuilder, Response};
use rewind_types::{
    ChangeSummary, ErrorResponse, OperationResponse, RollbackRequest, TagInfo, TagRequest,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default node address.
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("node error: {status} - {message}")]
    Node { status: u16, message: String },

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// History filters; empty values are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub author: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub resource: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
}

impl ChangeFilter {
    /// Query string pairs of the set filters.
    pub fn query(&self) -> Vec<(&'static str, &str)> {
        [
            ("author", &self.author),
            ("since", &self.since),
            ("until", &self.until),
            ("resource", &self.resource),
            ("namespace", &self.namespace),
            ("name", &self.name),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// Client for the node API.
#[derive(Clone)]
pub struct RewindClient {
    base_url: String,
    http: Client,
}

impl RewindClient {
    /// Creates a client for the node at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Lists changes, newest first.
    pub async fn changes(&self, filter: &ChangeFilter) -> Result<Vec<ChangeSummary>> {
        self.send(self.http.get(self.url("/changes")).query(&filter.query()))
            .await
    }

    /// Creates or deletes a tag.
    pub async fn tag(&self, request: &TagRequest) -> Result<OperationResponse> {
        self.send(self.http.post(self.url("/tag")).json(request)).await
    }

    /// Lists tags.
    pub async fn tags(&self) -> Result<Vec<TagInfo>> {
        self.send(self.http.get(self.url("/tags"))).await
    }

    /// Rolls back to a tag or commit.
    pub async fn rollback(&self, request: &RollbackRequest) -> Result<OperationResponse> {
        self.send(self.http.post(self.url("/rollback")).json(request))
            .await
    }

    /// Clears a failed rollback.
    pub async fn recover(&self) -> Result<OperationResponse> {
        self.send(self.http.post(self.url("/rollback/recover")))
            .await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        tracing::debug!(url = %response.url(), status = %response.status(), "Node replied");
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(CliError::Node {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_str(&body).map_err(|e| CliError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_skips_unset_and_blank() {
        let filter = ChangeFilter {
            author: Some("alice".into()),
            since: Some("  ".into()),
            namespace: Some("ns1".into()),
            ..Default::default()
        };
        assert_eq!(filter.query(), vec![("author", "alice"), ("namespace", "ns1")]);
        assert!(ChangeFilter::default().query().is_empty());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = RewindClient::new("http://node:8080/").unwrap();
        assert_eq!(client.url("/tags"), "http://node:8080/tags");
    }
}
