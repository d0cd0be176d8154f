use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Application level credentials, fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    consumer_key: String,
    consumer_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bearer_token: Option<String>,
}

impl Credentials {
    pub fn new<TKey, TSecret>(consumer_key: TKey, consumer_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Credentials {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            bearer_token: None,
        }
    }

    /// set the app-only bearer token
    pub fn bearer_token<T>(self, bearer_token: T) -> Self
    where
        T: Into<String>,
    {
        Credentials {
            bearer_token: Some(bearer_token.into()),
            ..self
        }
    }

    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub fn consumer_secret(&self) -> &str {
        &self.consumer_secret
    }

    pub fn get_bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }
}

/// A request token (before authorization) or an access token (after).
///
/// Persisting tokens between calls is left to the caller, which is why the
/// type is serializable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// OAuth Token
    pub oauth_token: String,
    /// OAuth Token Secret
    pub oauth_token_secret: String,
    /// Provider user id, present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Provider screen name, present on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    /// Nonce generated when the request token was acquired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Other contents
    #[serde(flatten)]
    pub remain: HashMap<String, String>,
}

impl Token {
    pub fn new<TKey, TSecret>(oauth_token: TKey, oauth_token_secret: TSecret) -> Self
    where
        TKey: Into<String>,
        TSecret: Into<String>,
    {
        Token {
            oauth_token: oauth_token.into(),
            oauth_token_secret: oauth_token_secret.into(),
            ..Default::default()
        }
    }

    pub fn user_id<T: Into<String>>(self, user_id: T) -> Self {
        Token {
            user_id: Some(user_id.into()),
            ..self
        }
    }

    pub fn screen_name<T: Into<String>>(self, screen_name: T) -> Self {
        Token {
            screen_name: Some(screen_name.into()),
            ..self
        }
    }
}

/// Supplies the key material for one signed request.
pub trait SecretsProvider {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str);

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)>;

    fn get_bearer_token<'a>(&'a self) -> Option<&'a str>;

    fn get_token_option_pair<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        self.get_token_pair_option()
            .map(|s| (Some(s.0), Some(s.1)))
            .unwrap_or_else(|| (None, None))
    }
}

/// Credentials paired with the token acting on a single request.
#[derive(Debug, Clone, Copy)]
pub struct Secrets<'a> {
    credentials: &'a Credentials,
    token: Option<&'a Token>,
}

impl<'a> Secrets<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Secrets {
            credentials,
            token: None,
        }
    }

    pub fn token(self, token: &'a Token) -> Self {
        Secrets {
            token: Some(token),
            ..self
        }
    }

    pub fn token_option(self, token: Option<&'a Token>) -> Self {
        Secrets { token, ..self }
    }
}

impl SecretsProvider for Secrets<'_> {
    fn get_consumer_key_pair<'a>(&'a self) -> (&'a str, &'a str) {
        (
            self.credentials.consumer_key(),
            self.credentials.consumer_secret(),
        )
    }

    fn get_token_pair_option<'a>(&'a self) -> Option<(&'a str, &'a str)> {
        self.token
            .map(|t| (t.oauth_token.as_str(), t.oauth_token_secret.as_str()))
    }

    fn get_bearer_token<'a>(&'a self) -> Option<&'a str> {
        self.credentials
            .get_bearer_token()
            .filter(|token| !token.is_empty())
    }

    // an empty oauth_token is left out of the request, but its secret still keys the signature
    fn get_token_option_pair<'a>(&'a self) -> (Option<&'a str>, Option<&'a str>) {
        match self.get_token_pair_option() {
            Some((token, secret)) => (Some(token).filter(|t| !t.is_empty()), Some(secret)),
            None => (None, None),
        }
    }
}
