// ----------------------------------------------------------------------------
// This source code contains derived artifacts from seanmonstar's `reqwest`.
// for further information(including license information),
// please visit their repository: https://github.com/seanmonstar/reqwest .
// ----------------------------------------------------------------------------
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use reqwest::Client as ReqwestClient;
use tracing::trace;

use crate::{Parameters, TransportError};

/// A fully authenticated request, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Target URL; for `GET` it already carries the query string.
    pub url: String,
    pub headers: HeaderMap,
    /// Form body, empty for `GET`.
    pub body: Parameters,
    /// Whether the server certificate must be verified.
    pub verify_tls: bool,
}

/// The raw answer of the transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    pub fn new<T: Into<String>>(status: StatusCode, body: T) -> Self {
        TransportResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry; connection level failures are returned as
/// [`TransportError`] and surface to the caller unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    verifying: ReqwestClient,
    lenient: ReqwestClient,
}

impl ReqwestTransport {
    /// Constructs a new `ReqwestTransport`.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(None)
    }

    /// Constructs a new `ReqwestTransport` whose requests give up after
    /// `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self, TransportError> {
        Ok(ReqwestTransport {
            verifying: build_client(timeout, true)?,
            lenient: build_client(timeout, false)?,
        })
    }

    /// Constructs a new `ReqwestTransport` with specifying inner
    /// `reqwest::Client`s for verified and unverified TLS.
    pub fn new_with_clients(verifying: ReqwestClient, lenient: ReqwestClient) -> Self {
        ReqwestTransport { verifying, lenient }
    }

    fn client(&self, verify_tls: bool) -> &ReqwestClient {
        if verify_tls {
            &self.verifying
        } else {
            &self.lenient
        }
    }
}

fn build_client(timeout: Option<Duration>, verify_tls: bool) -> Result<ReqwestClient, TransportError> {
    let mut builder = ReqwestClient::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    #[cfg(any(feature = "default-tls", feature = "rustls-tls"))]
    {
        builder = builder.danger_accept_invalid_certs(!verify_tls);
    }
    #[cfg(not(any(feature = "default-tls", feature = "rustls-tls")))]
    let _ = verify_tls;

    Ok(builder.build()?)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            verify_tls,
        } = request;

        let mut builder = self
            .client(verify_tls)
            .request(method.clone(), url.as_str())
            .headers(headers);
        if method != Method::GET && !body.is_empty() {
            builder = builder.form(&body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        trace!(%status, bytes = body.len(), "transport response received");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
