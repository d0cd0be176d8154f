use thiserror::Error;

use crate::RateLimit;

pub type Result<T> = std::result::Result<T, Error>;
pub type SignResult<T> = std::result::Result<T, SignError>;
pub type TokenReaderResult<T> = std::result::Result<T, TokenReaderError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("token acquisition failed : {0}")]
    TokenReader(#[from] TokenReaderError),
    #[error("OAuth sign failed : {0}")]
    Signer(#[from] SignError),
    #[error("request failed : {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("response with status {status} could not be decoded : {body}")]
    Decode { status: u16, body: String },
    #[error("no current token is set; acquire a request token first")]
    MissingToken,
    #[error("bearer authentication requested but no bearer token is configured")]
    MissingBearerToken,
    #[error("invalid header value : {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
    #[error("form parameters could not be serialized : {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}

impl Error {
    /// Returns the HTTP status code when the provider rejected the request.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.code),
            Error::Decode { status, .. } => Some(*status),
            Error::Transport(TransportError::Reqwest(err)) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Non-2xx response from the provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API error {code} : {message}")]
pub struct ApiError {
    /// HTTP status code.
    pub code: u16,
    /// Best-effort message extracted from the response body.
    pub message: String,
    /// Rate limit values reported alongside the error.
    pub rate_limit: RateLimit,
}

impl ApiError {
    pub fn new<T: Into<String>>(code: u16, message: T) -> Self {
        ApiError {
            code,
            message: message.into(),
            rate_limit: RateLimit::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("{code} : {message}")]
    Other { code: String, message: String },
}

#[derive(Error, Debug, Clone)]
pub enum SignError {
    #[error("signing key rejected : {0}")]
    InvalidKey(String),
}

#[derive(Error, Debug, Clone)]
pub enum TokenReaderError {
    #[error("response has malformed format: not found {0} in {1}")]
    TokenKeyNotFound(&'static str, String),
    #[error("response is not a key/value payload: {0}")]
    UnexpectedPayload(String),
}
