use std::borrow::Cow;

use http::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::encode::encode;
use crate::{
    authenticate, generate_nonce, ApiRequest, AuthMode, ClientConfig, Credentials, Error,
    OAuthParameters, Parameters, ReqwestTransport, ResponseNormalizer, Result, Secrets,
    SignedRequest, Token, TokenReader, Transport, OAUTH_CALLBACK_KEY, OAUTH_TOKEN_KEY,
    OAUTH_VERIFIER_KEY,
};

const REQUEST_TOKEN_ENDPOINT: &str = "oauth/request_token";
const AUTHORIZE_ENDPOINT: &str = "oauth/authorize";
const ACCESS_TOKEN_ENDPOINT: &str = "oauth/access_token";
const USER_ID_PLACEHOLDER: &str = ":id";
const CALLBACK_NONCE_KEY: &str = "nonce";

/// OAuth 1.0a / Bearer authenticated client of one provider API.
///
/// The client owns the application credentials and, optionally, a current
/// [`Token`]. Every call performs exactly one round-trip through the
/// [`Transport`]; nothing is retried.
///
/// Operations that replace the current token take `&mut self`, so a client
/// shared between tasks must be guarded by the caller. Requests that act on
/// behalf of a specific user can instead pass the token through
/// [`ApiRequest::token`] and only need `&self`.
#[derive(Debug)]
pub struct ApiClient<TTransport = ReqwestTransport> {
    credentials: Credentials,
    api_url: String,
    api_version: String,
    verify_tls: bool,
    normalizer: ResponseNormalizer,
    token: Option<Token>,
    transport: TTransport,
}

impl ApiClient<ReqwestTransport> {
    /// Constructs a new `ApiClient` sending requests through `reqwest`.
    ///
    /// # Errors
    ///
    /// This method fails if the underlying `reqwest::Client` cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(config.get_timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<TTransport> ApiClient<TTransport>
where
    TTransport: Transport,
{
    /// Constructs a new `ApiClient` with specifying the transport.
    pub fn with_transport(config: ClientConfig, transport: TTransport) -> Self {
        let normalizer =
            ResponseNormalizer::new().query_string_fallback(config.query_string_fallback);
        ApiClient {
            credentials: config.credentials,
            api_url: config.api_url,
            api_version: config.api_version,
            verify_tls: config.verify_tls,
            normalizer,
            token: config.token,
            transport,
        }
    }

    /// The current token, if any.
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Replaces the current token. No validation is performed.
    pub fn set_token(&mut self, token: Token) {
        self.token = Some(token);
    }

    /// Forgets the current token, returning it.
    pub fn take_token(&mut self) -> Option<Token> {
        self.token.take()
    }

    pub fn transport(&self) -> &TTransport {
        &self.transport
    }

    /// Builds `api_url/version/endpoint`.
    ///
    /// Slashes around `endpoint` and `version` are trimmed and an empty
    /// version is left out. `:id` in the endpoint is replaced with the current
    /// token's user id (or nothing without one).
    pub fn endpoint_url(&self, endpoint: &str, version: &str) -> String {
        self.endpoint_url_for(self.token.as_ref(), endpoint, version)
    }

    fn endpoint_url_for(&self, token: Option<&Token>, endpoint: &str, version: &str) -> String {
        let user_id = token
            .and_then(|t| t.user_id.as_deref())
            .unwrap_or_default();
        let endpoint = endpoint
            .trim_matches('/')
            .replace(USER_ID_PLACEHOLDER, user_id);
        let version = version.trim_matches('/');

        let mut url = format!("{}/", self.api_url.trim_end_matches('/'));
        if !version.is_empty() {
            url.push_str(version);
            url.push('/');
        }
        url.push_str(&endpoint);
        url
    }

    /// Step 1 of the OAuth dance: acquires a request token.
    ///
    /// A fresh nonce is sent as `oauth_nonce`, appended to `callback` as
    /// `nonce=...` and stored on the returned token, so the authorization
    /// callback can be matched with the pending request token. On success the
    /// token becomes the current token.
    pub async fn request_token(&mut self, callback: Option<&str>) -> Result<Token> {
        let nonce = generate_nonce();
        let url = self.endpoint_url(REQUEST_TOKEN_ENDPOINT, "");

        let mut request = ApiRequest::get(url)
            .oauth_parameters(OAuthParameters::new().nonce(nonce.as_str()));
        if let Some(callback) = callback.filter(|c| !c.is_empty()) {
            request = request.param(OAUTH_CALLBACK_KEY, with_nonce(callback, &nonce));
        }

        // request tokens are never signed with a previously held token
        let mut token = self.dispatch(request, None).await?.parse_oauth_token()?;
        token.nonce = Some(nonce);
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Step 2 of the OAuth dance: the URL the user authorizes the request
    /// token at.
    ///
    /// Returns `None` when there is no current token. `screen_name` pre-fills
    /// the login form and forces a fresh login.
    pub fn authorize_url(&self, screen_name: Option<&str>) -> Option<String> {
        let token = self.token.as_ref().filter(|t| !t.oauth_token.is_empty())?;

        let mut query = Vec::new();
        if let Some(screen_name) = screen_name.filter(|s| !s.is_empty()) {
            query.push(("screen_name", screen_name));
            query.push(("force_login", "true"));
        }
        query.push((OAUTH_TOKEN_KEY, token.oauth_token.as_str()));

        let query = query
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, encode(v)))
            .collect::<Vec<String>>()
            .join("&");
        Some(format!(
            "{}?{}",
            self.endpoint_url(AUTHORIZE_ENDPOINT, ""),
            query
        ))
    }

    /// Step 3 of the OAuth dance: exchanges the authorized request token for
    /// an access token, which replaces the current token.
    ///
    /// # Errors
    ///
    /// [`Error::MissingToken`] when there is no current request token to sign
    /// with; otherwise any transport, API or token parsing error.
    pub async fn access_token(&mut self, verifier: Option<&str>) -> Result<Token> {
        let request_token = self.token.as_ref().ok_or(Error::MissingToken)?;
        let url = self.endpoint_url(ACCESS_TOKEN_ENDPOINT, "");

        let mut request = ApiRequest::get(url);
        if let Some(verifier) = verifier.filter(|v| !v.is_empty()) {
            request = request.param(OAUTH_VERIFIER_KEY, verifier);
        }

        let token = self
            .dispatch(request, Some(request_token))
            .await?
            .parse_oauth_token()?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// Sends one authenticated request acting as the current token.
    ///
    /// `endpoint` is used as-is when it is an absolute URL, otherwise it is
    /// resolved with [`endpoint_url`](Self::endpoint_url) and the configured
    /// API version.
    pub async fn send_authed_request<I, K, V>(
        &self,
        endpoint: &str,
        method: Method,
        params: I,
        auth: AuthMode,
    ) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = ApiRequest::new(method, endpoint).params(params).auth(auth);
        self.send(request).await
    }

    /// Sends a request described by an [`ApiRequest`].
    ///
    /// The request acts as its own token when one was given, otherwise as the
    /// current token.
    pub async fn send(&self, request: ApiRequest<'_>) -> Result<Value> {
        let token = request.token.or(self.token.as_ref());
        self.dispatch(request, token).await
    }

    async fn dispatch(&self, request: ApiRequest<'_>, token: Option<&Token>) -> Result<Value> {
        let ApiRequest {
            method,
            endpoint,
            mut params,
            auth,
            oauth_parameters,
            ..
        } = request;

        let url = self.resolve(token, &method, &endpoint, &mut params);
        debug!(%method, %url, ?auth, "sending authenticated request");

        let mut signed = SignedRequest::new(method, url, params);
        let secrets = Secrets::new(&self.credentials).token_option(token);
        authenticate(&mut signed, auth, &secrets, oauth_parameters)?;

        let response = self
            .transport
            .send(signed.into_transport(self.verify_tls))
            .await?;
        self.normalizer.normalize(response)
    }

    // absolute URL or API-relative endpoint. A GET carries its parameters in
    // the query string it is rebuilt with, so query pairs already on the URL
    // move into `params` (explicit parameters win). Other methods keep the
    // URL as given; its query is signed alongside the body.
    fn resolve(
        &self,
        token: Option<&Token>,
        method: &Method,
        endpoint: &str,
        params: &mut Parameters,
    ) -> String {
        let url: Cow<str> = match Url::parse(endpoint) {
            Ok(url) if url.has_host() => Cow::Borrowed(endpoint),
            _ => Cow::Owned(self.endpoint_url_for(token, endpoint, &self.api_version)),
        };
        if *method != Method::GET {
            return url.into_owned();
        }

        match Url::parse(&url) {
            Ok(mut parsed) if parsed.query().is_some() => {
                for (k, v) in parsed.query_pairs().into_owned() {
                    params.entry(k).or_insert(v);
                }
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.into()
            }
            _ => url.into_owned(),
        }
    }
}

// add_query_arg style: append `nonce=<nonce>` to the callback URL
fn with_nonce(callback: &str, nonce: &str) -> String {
    match Url::parse(callback) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(CALLBACK_NONCE_KEY, nonce);
            url.into()
        }
        Err(_) => {
            let separator = if callback.contains('?') { '&' } else { '?' };
            format!("{}{}{}={}", callback, separator, CALLBACK_NONCE_KEY, nonce)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::{ApiError, OAUTH_NONCE_KEY, OAUTH_SIGNATURE_KEY};

    fn config(api_url: &str) -> ClientConfig {
        ClientConfig::new("test_consumer_key", "test_consumer_secret")
            .bearer_token("test_bearer_token")
            .api_url(api_url)
    }

    fn client(api_url: &str) -> ApiClient {
        ApiClient::new(config(api_url)).unwrap()
    }

    fn access_token() -> Token {
        Token::new("access", "access_secret")
            .user_id("783214")
            .screen_name("alice")
    }

    #[test]
    fn endpoint_url_joins_version_and_path() {
        let client = client("https://api.twitter.com/");
        assert_eq!(
            client.endpoint_url("/lists/create/", "1.1"),
            "https://api.twitter.com/1.1/lists/create"
        );
        assert_eq!(
            client.endpoint_url("oauth/request_token", ""),
            "https://api.twitter.com/oauth/request_token"
        );

        let client = ApiClient::new(config("https://api.example.com")).unwrap();
        assert_eq!(
            client.endpoint_url("users/me", "/2/"),
            "https://api.example.com/2/users/me"
        );
    }

    #[test]
    fn endpoint_url_uses_given_version_not_endpoint() {
        // the version segment comes from the version argument, never from the
        // endpoint path
        let client = client("https://api.twitter.com/");
        let url = client.endpoint_url("lists/create", "2");
        assert_eq!(url, "https://api.twitter.com/2/lists/create");
        assert_ne!(url, "https://api.twitter.com/lists/create/lists/create");
    }

    #[test]
    fn endpoint_url_replaces_user_id_placeholder() {
        let mut client = client("https://api.twitter.com/");
        assert_eq!(
            client.endpoint_url("users/:id/followers", "2"),
            "https://api.twitter.com/2/users//followers"
        );

        client.set_token(access_token());
        assert_eq!(
            client.endpoint_url("users/:id/followers", "2"),
            "https://api.twitter.com/2/users/783214/followers"
        );
    }

    #[test]
    fn authorize_url_requires_token() {
        let mut client = client("https://api.twitter.com/");
        assert_eq!(client.authorize_url(Some("alice")), None);

        client.set_token(Token::new("req token", "req_secret"));
        assert_eq!(
            client.authorize_url(None).unwrap(),
            "https://api.twitter.com/oauth/authorize?oauth_token=req%20token"
        );
        assert_eq!(
            client.authorize_url(Some("alice")).unwrap(),
            "https://api.twitter.com/oauth/authorize?screen_name=alice&force_login=true&oauth_token=req%20token"
        );
    }

    #[test]
    fn callback_gets_nonce() {
        assert_eq!(
            with_nonce("https://cb/x", "abc"),
            "https://cb/x?nonce=abc"
        );
        assert_eq!(
            with_nonce("https://example.com/cb?page=tlm", "abc"),
            "https://example.com/cb?page=tlm&nonce=abc"
        );
        assert_eq!(with_nonce("oob", "abc"), "oob?nonce=abc");
    }

    #[test]
    fn resolve_lifts_query_pairs() {
        let client = client("https://api.twitter.com/");
        let mut params = Parameters::new();
        params.insert("count".to_string(), "5".to_string());

        let url = client.resolve(
            None,
            &Method::GET,
            "https://api.twitter.com/1.1/lists/members.json?list_id=7&count=100#top",
            &mut params,
        );
        assert_eq!(url, "https://api.twitter.com/1.1/lists/members.json");
        assert_eq!(params["list_id"], "7");
        assert_eq!(params["count"], "5");

        let mut params = Parameters::new();
        let url = client.resolve(None, &Method::GET, "application/rate_limit_status", &mut params);
        assert_eq!(url, "https://api.twitter.com/2/application/rate_limit_status");
        assert!(params.is_empty());
    }

    #[test]
    fn resolve_keeps_query_for_non_get() {
        let client = client("https://api.twitter.com/");
        let mut params = Parameters::new();

        let url = client.resolve(
            None,
            &Method::DELETE,
            "https://api.twitter.com/1.1/lists/destroy.json?list_id=7",
            &mut params,
        );
        assert_eq!(url, "https://api.twitter.com/1.1/lists/destroy.json?list_id=7");
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn oauth_dance() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/request_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "oauth_token=req_token&oauth_token_secret=req_secret&oauth_callback_confirmed=true",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth/access_token"))
            .and(query_param("oauth_verifier", "verifier123"))
            .and(query_param("oauth_token", "req_token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "oauth_token=acc_token&oauth_token_secret=acc_secret&user_id=783214&screen_name=alice",
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut client = client(&mock_server.uri());

        // step 1
        let request_token = client.request_token(Some("https://cb/x")).await.unwrap();
        assert_eq!(request_token.oauth_token, "req_token");
        assert_eq!(request_token.oauth_token_secret, "req_secret");
        let nonce = request_token.nonce.clone().unwrap();
        assert!(!nonce.is_empty());
        assert_eq!(client.token(), Some(&request_token));

        let received = mock_server.received_requests().await.unwrap();
        let query = received[0]
            .url
            .query_pairs()
            .into_owned()
            .collect::<Parameters>();
        assert_eq!(query[OAUTH_NONCE_KEY], nonce);
        assert_eq!(
            query[OAUTH_CALLBACK_KEY],
            format!("https://cb/x?nonce={}", nonce)
        );
        assert!(!query.contains_key(OAUTH_TOKEN_KEY));
        assert!(query.contains_key(OAUTH_SIGNATURE_KEY));

        // step 2
        let authorize = client.authorize_url(Some("alice")).unwrap();
        assert!(authorize.contains("screen_name=alice&force_login=true&oauth_token=req_token"));

        // step 3
        let access = client.access_token(Some("verifier123")).await.unwrap();
        assert_eq!(access.oauth_token, "acc_token");
        assert_eq!(access.user_id.as_deref(), Some("783214"));
        assert_eq!(access.screen_name.as_deref(), Some("alice"));
        assert_eq!(client.token(), Some(&access));
        assert_ne!(client.token(), Some(&request_token));
    }

    #[tokio::test]
    async fn access_token_without_request_token_fails() {
        let mut client = client("https://api.twitter.com/");
        let result = client.access_token(Some("verifier123")).await;
        assert!(matches!(result, Err(Error::MissingToken)));
    }

    #[tokio::test]
    async fn failed_request_token_keeps_current_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth/request_token"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(
                    "<?xml version=\"1.0\"?><hash><error>Invalid consumer</error></hash>",
                ),
            )
            .mount(&mock_server)
            .await;

        let mut client = client(&mock_server.uri());
        client.set_token(access_token());
        let result = client.request_token(None).await;
        match result {
            Err(Error::Api(ApiError { code, message, .. })) => {
                assert_eq!(code, 401);
                assert_eq!(message, "Invalid consumer");
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(client.token(), Some(&access_token()));
    }

    #[tokio::test]
    async fn signed_get_sends_oauth_query() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/application/rate_limit_status"))
            .and(query_param("resources", "statuses,lists"))
            .and(query_param("oauth_token", "access"))
            .and(query_param("oauth_version", "1.0"))
            .and(query_param("oauth_signature_method", "HMAC-SHA1"))
            .and(query_param("oauth_consumer_key", "test_consumer_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {"lists": {}}
            })))
            .mount(&mock_server)
            .await;

        let mut client = client(&mock_server.uri());
        client.set_token(access_token());
        let value = client
            .send_authed_request(
                "application/rate_limit_status",
                Method::GET,
                vec![("resources", "statuses,lists")],
                AuthMode::OAuth,
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"resources": {"lists": {}}}));

        let received = mock_server.received_requests().await.unwrap();
        assert!(received[0].headers.get("authorization").is_none());
        assert!(received[0]
            .url
            .query_pairs()
            .any(|(k, _)| k == OAUTH_SIGNATURE_KEY));
    }

    #[tokio::test]
    async fn signed_post_keeps_body_and_uses_header() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1.1/lists/create.json"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let token = access_token();
        let request = ApiRequest::post(format!("{}/1.1/lists/create.json", mock_server.uri()))
            .param("name", "friends")
            .param("description", "people I know")
            .token(&token);
        let value = client.send(request).await.unwrap();
        assert_eq!(value, json!({"id": 42}));

        let received = mock_server.received_requests().await.unwrap();
        let body = url::form_urlencoded::parse(&received[0].body)
            .into_owned()
            .collect::<Parameters>();
        assert_eq!(body.len(), 2);
        assert_eq!(body["name"], "friends");
        assert_eq!(body["description"], "people I know");

        let authorization = received[0].headers.get("authorization").unwrap();
        let authorization = authorization.to_str().unwrap();
        assert!(authorization.starts_with("OAuth "));
        assert!(authorization.contains("oauth_token=\"access\""));
        assert!(authorization.contains("oauth_signature=\""));
        assert!(received[0].url.query().is_none());
    }

    #[tokio::test]
    async fn signed_delete_keeps_query_on_url() {
        let mock_server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/1.1/lists/destroy.json"))
            .and(query_param("list_id", "7"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let token = access_token();
        let url = format!("{}/1.1/lists/destroy.json?list_id=7", mock_server.uri());
        let request = ApiRequest::delete(url.as_str())
            .oauth_parameters(OAuthParameters::new().nonce("abc").timestamp(1_318_622_958u64))
            .token(&token);
        let value = client.send(request).await.unwrap();
        assert_eq!(value, json!({"id": 7}));

        let received = mock_server.received_requests().await.unwrap();
        assert_eq!(received[0].url.query(), Some("list_id=7"));
        assert!(received[0].body.is_empty());

        // the query pair is part of the signed parameter set
        let authorization = received[0].headers.get("authorization").unwrap();
        let header_params = authorization
            .to_str()
            .unwrap()
            .strip_prefix("OAuth ")
            .unwrap()
            .split(", ")
            .filter_map(|item| item.split_once('='))
            .map(|(k, v)| {
                (
                    k.to_string(),
                    crate::encode::decode(v.trim_matches('"')).into_owned(),
                )
            })
            .collect::<Parameters>();
        assert!(!header_params.contains_key("list_id"));
        let mut signed = header_params.clone();
        signed.insert("list_id".to_string(), "7".to_string());
        let expected = crate::sign(
            &signed,
            &url,
            "DELETE",
            "test_consumer_secret",
            Some("access_secret"),
        )
        .unwrap();
        assert_eq!(header_params[OAUTH_SIGNATURE_KEY], expected);
    }

    #[tokio::test]
    async fn sub_second_timeout_reaches_healthy_server() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
            .mount(&mock_server)
            .await;

        let config = config(&mock_server.uri()).timeout(std::time::Duration::from_millis(500));
        let client = ApiClient::new(config).unwrap();
        let value = client
            .send(ApiRequest::get("users/me").bearer())
            .await
            .unwrap();
        assert_eq!(value, json!({"data": {}}));
    }

    #[tokio::test]
    async fn bearer_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/by/username/alice"))
            .and(header("authorization", "Bearer test_bearer_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "783214", "username": "alice"}
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let value = client
            .send(ApiRequest::get("users/by/username/alice").bearer())
            .await
            .unwrap();
        assert_eq!(value["data"]["id"], "783214");

        let received = mock_server.received_requests().await.unwrap();
        assert!(received[0].url.query().is_none());
    }

    #[tokio::test]
    async fn api_error_carries_status_and_detail() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "title": "Unauthorized",
                "detail": "bad token"
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server.uri());
        let result = client
            .send_authed_request(
                "users/me",
                Method::GET,
                Vec::<(String, String)>::new(),
                AuthMode::OAuth,
            )
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        match err {
            Error::Api(err) => assert_eq!(err.message, "bad token"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn transport_failure_is_propagated() {
        let client = client("http://127.0.0.1:1/");
        let result = client
            .send(ApiRequest::get("users/me"))
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
