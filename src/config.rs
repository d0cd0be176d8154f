//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Credentials, Token, DEFAULT_API_URL, DEFAULT_API_VERSION};

/// Everything an [`ApiClient`](crate::ApiClient) is constructed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Consumer key, consumer secret and optional bearer token
    #[serde(flatten)]
    pub credentials: Credentials,

    /// Root of the provider API (default: https://api.twitter.com/)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Version segment used for relative endpoints (default: 2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Verify the server's TLS certificate.
    ///
    /// Off by default to match the behavior this client has always had. Turn
    /// it on wherever possible.
    #[serde(default)]
    pub verify_tls: bool,

    /// Transport timeout in milliseconds; none when absent or zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Read non-JSON `key=value` success bodies as flat maps (default: true)
    #[serde(default = "default_query_string_fallback")]
    pub query_string_fallback: bool,

    /// Token the client starts with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.into()
}

fn default_query_string_fallback() -> bool {
    true
}

impl ClientConfig {
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        ClientConfig {
            credentials: Credentials::new(consumer_key, consumer_secret),
            api_url: default_api_url(),
            api_version: default_api_version(),
            verify_tls: false,
            timeout_ms: None,
            query_string_fallback: default_query_string_fallback(),
            token: None,
        }
    }

    pub fn bearer_token<T: Into<String>>(self, bearer_token: T) -> Self {
        ClientConfig {
            credentials: self.credentials.bearer_token(bearer_token),
            ..self
        }
    }

    pub fn api_url<T: Into<String>>(self, api_url: T) -> Self {
        ClientConfig {
            api_url: api_url.into(),
            ..self
        }
    }

    pub fn api_version<T: Into<String>>(self, api_version: T) -> Self {
        ClientConfig {
            api_version: api_version.into(),
            ..self
        }
    }

    pub fn verify_tls(self, verify_tls: bool) -> Self {
        ClientConfig { verify_tls, ..self }
    }

    /// Sets the transport timeout, rounded up to whole milliseconds.
    pub fn timeout(self, timeout: Duration) -> Self {
        let partial = u128::from(timeout.subsec_nanos() % 1_000_000 != 0);
        let millis = u64::try_from(timeout.as_millis() + partial).unwrap_or(u64::MAX);
        ClientConfig {
            timeout_ms: Some(millis),
            ..self
        }
    }

    pub fn query_string_fallback(self, query_string_fallback: bool) -> Self {
        ClientConfig {
            query_string_fallback,
            ..self
        }
    }

    pub fn token(self, token: Token) -> Self {
        ClientConfig {
            token: Some(token),
            ..self
        }
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|millis| *millis > 0)
            .map(Duration::from_millis)
    }
}
