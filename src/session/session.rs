use anyhow::{anyhow, Context};
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;

use crate::api::response::ApiResponse;
use crate::config::{Credentials, HarnessConfig};

/// An authenticated HTTP client bound to one service and org.
///
/// Cloning is cheap and shares the underlying connection pool. The session is released
/// when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct Session {
    client: Client,
    base_url: Url,
    org: String,
    credentials: Option<Credentials>,
}

impl Session {
    pub fn open(config: &HarnessConfig) -> anyhow::Result<Session> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client!")?;

        info!(
            "Opened session against {} for org {} ({})",
            config.base_url,
            config.org,
            if config.credentials.is_some() { "basic auth" } else { "anonymous" }
        );

        Ok(Session {
            client,
            base_url: config.base_url.clone(),
            org: config.org.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// `{base_url}api/{org}/{segments...}`, with every segment percent-encoded.
    pub fn org_url(&self, segments: &[&str]) -> anyhow::Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be a base URL!", self.base_url))?
            .pop_if_empty()
            .push("api")
            .push(&self.org)
            .extend(segments);
        Ok(url)
    }

    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credentials {
            Some(credentials) => request.basic_auth(&credentials.user, Some(&credentials.password)),
            None => request,
        }
    }

    pub async fn get(&self, segments: &[&str]) -> anyhow::Result<ApiResponse> {
        self.execute(self.request(Method::GET, self.org_url(segments)?))
            .await
    }

    pub async fn delete(&self, segments: &[&str]) -> anyhow::Result<ApiResponse> {
        self.execute(self.request(Method::DELETE, self.org_url(segments)?))
            .await
    }

    pub async fn post_json<T>(&self, segments: &[&str], body: &T) -> anyhow::Result<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        self.execute(self.request(Method::POST, self.org_url(segments)?).json(body))
            .await
    }

    pub async fn put_json<T>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        body: &T,
    ) -> anyhow::Result<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        let request = self.request(Method::PUT, self.org_url(segments)?);
        let request = if query.is_empty() { request } else { request.query(query) };
        self.execute(request.json(body)).await
    }

    /// Sends the request and buffers the whole body. Transport failures are errors; any
    /// status code, including 4xx and 5xx, is a response for the caller to judge.
    pub async fn execute(&self, request: RequestBuilder) -> anyhow::Result<ApiResponse> {
        let request = request.build().context("Failed to build request!")?;
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("{method} {url} failed"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("{method} {url}: failed to read response body"))?;

        debug!("{} {} -> {} ({} bytes)", method, url, status, body.len());

        Ok(ApiResponse {
            method,
            url,
            status,
            body,
        })
    }
}
