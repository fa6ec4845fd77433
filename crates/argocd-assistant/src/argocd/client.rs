use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[cfg(test)]
use mockall::automock;

use super::types::{ApplicationRef, ResourceEventsQuery, ResourceRef};

/// Number of trailing log lines requested from Argo CD
pub const LOG_TAIL_LINES: u32 = 100;

/// Longest error body kept when Argo CD rejects a request
const MAX_ERROR_BODY: usize = 512;

/// The read-only Argo CD operations the inspection tools are built on
///
/// JSON endpoints are returned as raw [`Value`]s so the model sees what Argo CD sent.
/// Log endpoints return the newline-delimited body untouched; decoding it is the
/// caller's concern.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn application(&self, app: &ApplicationRef) -> Result<Value>;

    async fn resource_tree(&self, app: &ApplicationRef) -> Result<Value>;

    async fn managed_resources(&self, app: &ApplicationRef) -> Result<Value>;

    async fn application_logs(&self, app: &ApplicationRef) -> Result<String>;

    async fn workload_logs(&self, app: &ApplicationRef, resource: &ResourceRef) -> Result<String>;

    async fn pod_logs(&self, app: &ApplicationRef, pod_name: &str) -> Result<String>;

    async fn application_events(&self, app: &ApplicationRef) -> Result<Value>;

    async fn resource_events(
        &self,
        app: &ApplicationRef,
        query: &ResourceEventsQuery,
    ) -> Result<Value>;
}

/// [`ResourceClient`] over the Argo CD REST API, authenticated with a static bearer token
pub struct ArgoCdClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ArgoCdClient {
    pub fn new<S: Into<String>>(base_url: &str, token: S) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let parsed =
            Url::parse(base_url).map_err(|e| anyhow!("Invalid Argo CD URL {}: {}", base_url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Invalid Argo CD URL {}: unsupported scheme {}",
                base_url,
                parsed.scheme()
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            token: token.into(),
        })
    }

    fn application_path(app: &ApplicationRef) -> String {
        format!("/api/v1/applications/{}", urlencoding::encode(&app.name))
    }

    fn get(&self, path: &str, app: &ApplicationRef) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .query(&[("appNamespace", app.namespace.as_str())])
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<reqwest::Response> {
        tracing::debug!(path, "argocd request");
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            body.truncate(end);
        }
        Err(anyhow!(
            "Argo CD request {} failed: {}: {}",
            path,
            status,
            body
        ))
    }

    async fn get_json(&self, path: &str, request: RequestBuilder) -> Result<Value> {
        let response = self.send(path, request).await?;
        Ok(response.json().await?)
    }

    async fn get_text(&self, path: &str, request: RequestBuilder) -> Result<String> {
        let response = self.send(path, request).await?;
        Ok(response.text().await?)
    }

    fn log_query(request: RequestBuilder) -> RequestBuilder {
        request.query(&[
            ("follow", "false".to_string()),
            ("tailLines", LOG_TAIL_LINES.to_string()),
        ])
    }
}

#[async_trait]
impl ResourceClient for ArgoCdClient {
    async fn application(&self, app: &ApplicationRef) -> Result<Value> {
        let path = Self::application_path(app);
        self.get_json(&path, self.get(&path, app)).await
    }

    async fn resource_tree(&self, app: &ApplicationRef) -> Result<Value> {
        let path = format!("{}/resource-tree", Self::application_path(app));
        self.get_json(&path, self.get(&path, app)).await
    }

    async fn managed_resources(&self, app: &ApplicationRef) -> Result<Value> {
        let path = format!("{}/managed-resources", Self::application_path(app));
        self.get_json(&path, self.get(&path, app)).await
    }

    async fn application_logs(&self, app: &ApplicationRef) -> Result<String> {
        let path = format!("{}/logs", Self::application_path(app));
        let request = Self::log_query(self.get(&path, app));
        self.get_text(&path, request).await
    }

    async fn workload_logs(&self, app: &ApplicationRef, resource: &ResourceRef) -> Result<String> {
        let path = format!("{}/logs", Self::application_path(app));
        let request = self.get(&path, app).query(&[
            ("namespace", resource.namespace.as_str()),
            ("resourceName", resource.name.as_str()),
            ("group", resource.group.as_str()),
            ("kind", resource.kind.as_str()),
            ("version", resource.version.as_str()),
        ]);
        self.get_text(&path, Self::log_query(request)).await
    }

    async fn pod_logs(&self, app: &ApplicationRef, pod_name: &str) -> Result<String> {
        let path = format!(
            "{}/pods/{}/logs",
            Self::application_path(app),
            urlencoding::encode(pod_name)
        );
        let request = Self::log_query(self.get(&path, app));
        self.get_text(&path, request).await
    }

    async fn application_events(&self, app: &ApplicationRef) -> Result<Value> {
        let path = format!("{}/events", Self::application_path(app));
        self.get_json(&path, self.get(&path, app)).await
    }

    async fn resource_events(
        &self,
        app: &ApplicationRef,
        query: &ResourceEventsQuery,
    ) -> Result<Value> {
        let path = format!("{}/events", Self::application_path(app));
        let request = self.get(&path, app).query(&[
            ("resourceNamespace", query.namespace.as_str()),
            ("resourceUID", query.uid.as_str()),
            ("resourceName", query.name.as_str()),
        ]);
        self.get_json(&path, request).await
    }
}
