use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use http::Method;
use sha1::{Digest, Sha1};
use url::Url;

use crate::encode::{build_query, encode};
use crate::{
    Parameters, SecretsProvider, SignError, SignResult, OAUTH_CONSUMER_KEY, OAUTH_NONCE_KEY,
    OAUTH_SIGNATURE_KEY, OAUTH_SIGNATURE_METHOD_KEY, OAUTH_TIMESTAMP_KEY, OAUTH_TOKEN_KEY,
    OAUTH_VERSION_KEY,
};

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";

/// Reduces `url` to `scheme://host[:port]path`.
///
/// The host is lower-cased, a default port (80 for http, 443 for https) is
/// dropped, and the query and fragment are discarded. A URL that cannot be
/// parsed normalizes to `http://` with an empty host and path.
pub fn normalize_url(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(_) => return String::from("http://"),
    };
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    // Url::port() is None when the port is the scheme's default
    let port = parsed
        .port()
        .map(|port| format!(":{}", port))
        .unwrap_or_default();

    format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
}

/// Builds the signature base string `METHOD&url&parameters`.
///
/// `oauth_signature` is never part of the signed parameters, even if present.
pub fn build_base_string(method: &str, url: &str, parameters: &Parameters) -> String {
    let signable = parameters
        .iter()
        .filter(|(key, _)| key.as_str() != OAUTH_SIGNATURE_KEY);

    [
        method.to_uppercase(),
        normalize_url(url),
        build_query(signable),
    ]
    .iter()
    .map(|part| encode(part))
    .collect::<Vec<String>>()
    .join("&")
}

/// Computes the base64 HMAC-SHA1 signature of the request.
///
/// The key is `encode(consumer_secret)&encode(token_secret)`, with an empty
/// token secret when none is given.
pub fn sign(
    parameters: &Parameters,
    url: &str,
    method: &str,
    consumer_secret: &str,
    token_secret: Option<&str>,
) -> SignResult<String> {
    let base_string = build_base_string(method, url, parameters);
    let key = format!(
        "{}&{}",
        encode(consumer_secret),
        encode(token_secret.unwrap_or_default())
    );

    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| SignError::InvalidKey(e.to_string()))?;
    mac.update(base_string.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Generates a single-use `oauth_nonce`: a SHA-1 of the current time and fresh
/// random bytes, hex encoded.
pub fn generate_nonce() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let noise: [u8; 16] = rand::random();

    let mut hasher = Sha1::new();
    hasher.update(nanos.to_be_bytes());
    hasher.update(noise);
    hex::encode(hasher.finalize())
}

/// Current Unix time in seconds.
pub fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    secrets: &'a TSecretsProvider,
    parameters: OAuthParameters<'a>,
}

impl<'a, TSecretsProvider> Signer<'a, TSecretsProvider>
where
    TSecretsProvider: SecretsProvider,
{
    pub fn new(secrets: &'a TSecretsProvider, parameters: OAuthParameters<'a>) -> Self {
        Signer {
            secrets,
            parameters,
        }
    }

    /// The `oauth_*` protocol parameters of one request, without the signature.
    ///
    /// A fresh nonce and timestamp are generated unless pinned through
    /// [`OAuthParameters`]. `oauth_token` is only present when a token is set.
    pub fn oauth_parameters(&self) -> Parameters {
        let (consumer_key, _) = self.secrets.get_consumer_key_pair();
        let (token, _) = self.secrets.get_token_option_pair();

        let mut params = Parameters::new();
        params.insert(OAUTH_VERSION_KEY.to_string(), OAUTH_VERSION.to_string());
        params.insert(
            OAUTH_NONCE_KEY.to_string(),
            self.parameters
                .nonce
                .as_deref()
                .map(String::from)
                .unwrap_or_else(generate_nonce),
        );
        params.insert(
            OAUTH_TIMESTAMP_KEY.to_string(),
            self.parameters
                .timestamp
                .unwrap_or_else(timestamp)
                .to_string(),
        );
        params.insert(OAUTH_CONSUMER_KEY.to_string(), consumer_key.to_string());
        params.insert(
            OAUTH_SIGNATURE_METHOD_KEY.to_string(),
            SIGNATURE_METHOD.to_string(),
        );
        if let Some(token) = token {
            params.insert(OAUTH_TOKEN_KEY.to_string(), token.to_string());
        }
        params
    }

    /// Signs `parameters` (the complete set to be transmitted) with the
    /// consumer secret and, when present, the token secret.
    pub fn generate_signature(
        &self,
        method: &Method,
        url: &str,
        parameters: &Parameters,
    ) -> SignResult<String> {
        let (_, consumer_secret) = self.secrets.get_consumer_key_pair();
        let (_, token_secret) = self.secrets.get_token_option_pair();
        sign(
            parameters,
            url,
            method.as_str(),
            consumer_secret,
            token_secret,
        )
    }
}

/// Pins protocol values that are otherwise generated per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthParameters<'a> {
    nonce: Option<Cow<'a, str>>,
    timestamp: Option<u64>,
}

impl<'a> OAuthParameters<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    /// set the oauth_nonce value
    pub fn nonce<T>(self, nonce: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        OAuthParameters {
            nonce: Some(nonce.into()),
            ..self
        }
    }

    /// set the oauth_timestamp value
    pub fn timestamp<T>(self, timestamp: T) -> Self
    where
        T: Into<u64>,
    {
        OAuthParameters {
            timestamp: Some(timestamp.into()),
            ..self
        }
    }
}
