/*!
reqwest-oauth1-client: an OAuth 1.0a / Bearer authenticated REST API client on top of reqwest.

# Overview

This library talks to a third-party REST API (Twitter style) on behalf of an
application and its users. It performs the three-legged OAuth 1.0a dance
(request token, user authorization, access token), signs every request with
HMAC-SHA1, or authenticates app-only calls with a static bearer token, and
classifies the responses into JSON payloads or typed errors.

Persisting tokens is left to the caller: [`Token`] is serializable and can be
handed back to the client with [`ApiClient::set_token`] or per request with
[`ApiRequest::token`].

# How to use

## Basic usecase 1 - acquiring an access token

```ignore
use reqwest_oauth1_client::{ApiClient, ClientConfig};

let config = ClientConfig::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]");
let mut client = ApiClient::new(config)?;

// step 1: acquire request token & token secret
let request_token = client
    .request_token(Some("https://example.com/callback"))
    .await?;
// persist `request_token` keyed by `request_token.nonce` here

// step 2: send the user to the provider
let url = client.authorize_url(Some("alice")).unwrap();
println!("please access to: {}", url);

// step 3: on callback, restore the request token and exchange the verifier
client.set_token(request_token);
let access_token = client.access_token(Some("[OAUTH_VERIFIER]")).await?;
println!(
    "your token and secret is: \n token: {}\n secret: {}",
    access_token.oauth_token, access_token.oauth_token_secret
);
```

## Basic usecase 2 - calling the API

```ignore
use reqwest_oauth1_client::{ApiClient, ApiRequest, AuthMode, ClientConfig, Method, Token};

let config = ClientConfig::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]")
    .bearer_token("[BEARER_TOKEN]")
    .api_version("1.1");
let client = ApiClient::new(config)?;
let alice = Token::new("[ACCESS_TOKEN]", "[TOKEN_SECRET]");

// signed as alice, parameters go into the form body
let list = client
    .send(
        ApiRequest::post("lists/create")
            .param("name", "friends")
            .token(&alice),
    )
    .await?;

// app-only
let user = client
    .send_authed_request(
        "users/by/username/alice",
        Method::GET,
        Vec::<(String, String)>::new(),
        AuthMode::Bearer,
    )
    .await?;
```

## Basic usecase 3 - reading a token from any token endpoint

[`TokenReaderFuture`] turns the pending response of a token endpoint into a
[`Token`]; [`TokenReader`] does the same for a payload already awaited.

```ignore
use reqwest_oauth1_client::{ApiClient, ApiRequest, ClientConfig, Token, TokenReaderFuture};

let config = ClientConfig::new("[CONSUMER_KEY]", "[CONSUMER_SECRET]");
let client = ApiClient::new(config)?;
let request_token = Token::new("[REQUEST_TOKEN]", "[REQUEST_TOKEN_SECRET]");

let access_token = client
    .send(
        ApiRequest::post("https://api.twitter.com/oauth/access_token")
            .param("oauth_verifier", "[OAUTH_VERIFIER]")
            .token(&request_token),
    )
    .parse_oauth_token()
    .await?;
```
*/
use std::collections::BTreeMap;

mod auth;
mod client;
mod config;
pub mod encode;
mod error;
mod request;
mod response;
mod secrets;
mod signer;
mod token_reader;
mod transport;

// exposed to external program
pub use auth::{authenticate, AuthMode};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{
    ApiError, Error, Result, SignError, SignResult, TokenReaderError, TokenReaderResult,
    TransportError,
};
pub use http::Method;
pub use request::{ApiRequest, SignedRequest};
pub use response::{extract_error_message, RateLimit, ResponseNormalizer, UNRECOGNIZED_ERROR_MESSAGE};
pub use secrets::{Credentials, Secrets, SecretsProvider, Token};
pub use signer::{
    build_base_string, generate_nonce, normalize_url, sign, timestamp, OAuthParameters, Signer,
};
pub use token_reader::{TokenReader, TokenReaderFuture};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

/// Body parameters of a request; iteration order is the signing order.
pub type Parameters = BTreeMap<String, String>;

// exposed constant variables
/// Default root of the provider API.
pub const DEFAULT_API_URL: &str = "https://api.twitter.com/";
/// Default version segment for relative endpoints.
pub const DEFAULT_API_VERSION: &str = "2";
/// Represents `oauth_callback`.
pub const OAUTH_CALLBACK_KEY: &str = "oauth_callback";
/// Represents `oauth_nonce`.
pub const OAUTH_NONCE_KEY: &str = "oauth_nonce";
/// Represents `oauth_signature`.
pub const OAUTH_SIGNATURE_KEY: &str = "oauth_signature";
/// Represents `oauth_timestamp`.
pub const OAUTH_TIMESTAMP_KEY: &str = "oauth_timestamp";
/// Represents `oauth_verifier`.
pub const OAUTH_VERIFIER_KEY: &str = "oauth_verifier";
/// Represents `oauth_version`.
pub const OAUTH_VERSION_KEY: &str = "oauth_version";

// crate-private constant variables
pub(crate) const OAUTH_SIGNATURE_METHOD_KEY: &str = "oauth_signature_method";
pub(crate) const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub(crate) const OAUTH_TOKEN_KEY: &str = "oauth_token";
pub(crate) const OAUTH_TOKEN_SECRET_KEY: &str = "oauth_token_secret";
