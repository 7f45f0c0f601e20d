//! HTTP seam between the provider adapters and the network.

use super::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt::Debug;
use url::Url;

/// Outbound JSON POST produced by an adapter
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    /// Parses the endpoint and starts a request with an empty header list
    pub fn post(endpoint: &str, body: Value) -> Result<Self, LlmError> {
        let url = Url::parse(endpoint)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        Ok(HttpRequest {
            url,
            headers: Vec::new(),
            body,
        })
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    #[cfg(test)]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw provider answer before any shape checks
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Debug + Send + Sync {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, LlmError>;
}

/// Production transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        ReqwestTransport {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, request: HttpRequest) -> Result<HttpResponse, LlmError> {
        let mut builder = self.client.post(request.url.as_str()).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let res = builder.send().await?;
        let status = res.status();
        let body = res.text().await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
