//! HTTP transport seam
//!
//! The fetcher talks to the network through this trait so retry and
//! pagination behavior can be exercised against scripted responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::shared::errors::TransportError;

/// Raw HTTP response as the fetcher sees it
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut request = self.client.get(url).query(params).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(err.to_string())
    }
}
