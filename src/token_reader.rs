use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    Error, Result, Token, TokenReaderError, TokenReaderResult, OAUTH_TOKEN_KEY,
    OAUTH_TOKEN_SECRET_KEY,
};

const USER_ID_KEY: &str = "user_id";
const SCREEN_NAME_KEY: &str = "screen_name";

/// Add parse_oauth_token feature to a normalized response payload.
// this trait is sealed
pub trait TokenReader: private::Sealed {
    fn parse_oauth_token(self) -> Result<Token>;
}

impl TokenReader for Value {
    fn parse_oauth_token(self) -> Result<Token> {
        Ok(read_oauth_token(self)?)
    }
}

/// Add parse_oauth_token feature to Future of a normalized response payload.
// this trait is also sealed
#[async_trait(?Send)]
pub trait TokenReaderFuture: private::SealedWrapper {
    async fn parse_oauth_token(self) -> Result<Token>;
}

#[async_trait(?Send)]
impl<T, E> TokenReaderFuture for T
where
    T: Future<Output = std::result::Result<Value, E>>,
    E: Into<Error> + 'static,
{
    async fn parse_oauth_token(self) -> Result<Token> {
        match self.await {
            Ok(payload) => payload.parse_oauth_token(),
            Err(err) => Err(err.into()),
        }
    }
}

fn read_oauth_token(payload: Value) -> TokenReaderResult<Token> {
    let object = match payload {
        Value::Object(object) => object,
        other => return Err(TokenReaderError::UnexpectedPayload(other.to_string())),
    };
    let text = Value::Object(object.clone()).to_string();

    let mut destructured = object
        .into_iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k, v)))
        .collect::<HashMap<String, String>>();
    let oauth_token = destructured.remove(OAUTH_TOKEN_KEY);
    let oauth_token_secret = destructured.remove(OAUTH_TOKEN_SECRET_KEY);
    match (oauth_token, oauth_token_secret) {
        (Some(t), Some(s)) => Ok(Token {
            oauth_token: t,
            oauth_token_secret: s,
            user_id: destructured.remove(USER_ID_KEY),
            screen_name: destructured.remove(SCREEN_NAME_KEY),
            nonce: None,
            remain: destructured,
        }),
        (None, _) => Err(TokenReaderError::TokenKeyNotFound(OAUTH_TOKEN_KEY, text)),
        (_, _) => Err(TokenReaderError::TokenKeyNotFound(
            OAUTH_TOKEN_SECRET_KEY,
            text,
        )),
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

mod private {
    use std::future::Future;

    use serde_json::Value;

    use crate::Error;

    pub trait Sealed {}
    impl Sealed for Value {}
    pub trait SealedWrapper {}
    impl<T, E> SealedWrapper for T
    where
        T: Future<Output = Result<Value, E>>,
        E: Into<Error>,
    {
    }
}
