use std::borrow::Cow;

use http::{HeaderMap, Method};
use serde::Serialize;

use crate::encode::build_query;
use crate::signer::normalize_url;
use crate::{AuthMode, OAuthParameters, Parameters, Result, Token, TransportRequest};

/// One request being authenticated.
///
/// Built per call, mutated by [`authenticate`](crate::authenticate), then
/// consumed by the transport.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub method: Method,
    pub url: String,
    pub body: Parameters,
    pub headers: HeaderMap,
}

impl SignedRequest {
    pub fn new<U: Into<String>>(method: Method, url: U, body: Parameters) -> Self {
        SignedRequest {
            method,
            url: url.into(),
            body,
            headers: HeaderMap::new(),
        }
    }

    /// Lays the request out for the wire.
    ///
    /// A `GET` carries every body parameter in the query string of the
    /// normalized URL; any other method keeps them as a form body.
    pub fn into_transport(self, verify_tls: bool) -> TransportRequest {
        let SignedRequest {
            method,
            url,
            body,
            headers,
        } = self;

        if method == Method::GET {
            let mut url = normalize_url(&url);
            if !body.is_empty() {
                url.push('?');
                url.push_str(&build_query(&body));
            }
            TransportRequest {
                method,
                url,
                headers,
                body: Parameters::new(),
                verify_tls,
            }
        } else {
            TransportRequest {
                method,
                url,
                headers,
                body,
                verify_tls,
            }
        }
    }
}

/// Describes one call made through [`ApiClient`](crate::ApiClient).
///
/// `endpoint` is either an absolute URL or a path resolved against the
/// client's API root.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    pub(crate) method: Method,
    pub(crate) endpoint: Cow<'a, str>,
    pub(crate) params: Parameters,
    pub(crate) auth: AuthMode,
    pub(crate) token: Option<&'a Token>,
    pub(crate) oauth_parameters: OAuthParameters<'a>,
}

impl<'a> ApiRequest<'a> {
    /// Start building a request with the `Method` and endpoint.
    pub fn new<E>(method: Method, endpoint: E) -> Self
    where
        E: Into<Cow<'a, str>>,
    {
        ApiRequest {
            method,
            endpoint: endpoint.into(),
            params: Parameters::new(),
            auth: AuthMode::default(),
            token: None,
            oauth_parameters: OAuthParameters::new(),
        }
    }

    /// Convenience method to make a `GET` request.
    pub fn get<E: Into<Cow<'a, str>>>(endpoint: E) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// Convenience method to make a `POST` request.
    pub fn post<E: Into<Cow<'a, str>>>(endpoint: E) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// Convenience method to make a `DELETE` request.
    pub fn delete<E: Into<Cow<'a, str>>>(endpoint: E) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Add a single body parameter; a repeated key overwrites.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add several body parameters.
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add body parameters from any value serializable as a flat form.
    ///
    /// # Errors
    /// This method fails if the value cannot be serialized into key/value
    /// pairs.
    pub fn form<T: Serialize + ?Sized>(self, form: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(form)?;
        let pairs = url::form_urlencoded::parse(encoded.as_bytes()).into_owned();
        Ok(self.params(pairs))
    }

    /// Select how the request is authenticated.
    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = auth;
        self
    }

    /// Authenticate with the app-only bearer token.
    pub fn bearer(self) -> Self {
        self.auth(AuthMode::Bearer)
    }

    /// Act as `token` for this request only, instead of the client's current
    /// token.
    pub fn token(mut self, token: &'a Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Pin protocol values such as the nonce or the timestamp.
    pub fn oauth_parameters(mut self, oauth_parameters: OAuthParameters<'a>) -> Self {
        self.oauth_parameters = oauth_parameters;
        self
    }
}
