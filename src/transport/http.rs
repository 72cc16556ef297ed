//! HTTP transport collaborator
//!
//! The registry transport drives the network through the narrow
//! [`HttpTransport`] trait: one round trip per call, no internal retries.
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! scripted mocks.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use std::borrow::Cow;

use crate::error::Result;

/// One HTTP exchange as seen by the registry transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Minimal HTTP client surface, performing exactly one network round trip
/// per invocation. Header lookup on the response is case-insensitive.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<HttpResponse>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    /// Accepts invalid TLS certificates, for registries behind self-signed
    /// or mismatched certs.
    pub fn new_insecure() -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn request(
        &self,
        url: &str,
        method: Method,
        body: Option<Vec<u8>>,
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
