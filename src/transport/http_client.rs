//! reqwest-backed transport.

use std::future::Future;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::transport::{FetchResponse, OutboundRequest, RequestBody, Transport, TransportError};

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client from transport configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn fetch(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<FetchResponse, TransportError>> + Send {
        let mut builder = self
            .client
            .request(request.options.method.clone(), request.url.clone())
            .headers(request.options.headers.clone());
        builder = match &request.options.body {
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            Some(RequestBody::Binary(bytes)) => builder.body(bytes.clone()),
            None => builder,
        };

        async move {
            let response = builder.send().await.map_err(classify)?;
            let url = response.url().clone();
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(classify)?;

            Ok(FetchResponse {
                url,
                status,
                headers,
                body,
            })
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
