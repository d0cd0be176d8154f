//! Classification of raw transport responses into payloads or typed errors.

use http::HeaderMap;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::encode::parse_query;
use crate::{ApiError, Error, Result, TransportResponse};

/// Message used when an error body yields nothing readable.
pub const UNRECOGNIZED_ERROR_MESSAGE: &str = "Could not recognize the response from the API";

/// Rate limit values reported by the provider in `x-rate-limit-*` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum number of requests allowed in the window
    pub limit: Option<u32>,
    /// Remaining requests in the current window
    pub remaining: Option<u32>,
    /// Unix timestamp when the window resets
    pub reset: Option<u64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        RateLimit {
            limit: header_number(headers, "x-rate-limit-limit"),
            remaining: header_number(headers, "x-rate-limit-remaining"),
            reset: header_number(headers, "x-rate-limit-reset"),
        }
    }
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Turns a [`TransportResponse`] into a JSON payload or an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseNormalizer {
    query_string_fallback: bool,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        ResponseNormalizer {
            query_string_fallback: true,
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Enables or disables reading a non-JSON success body containing `=` as a
    /// flat `key=value&...` map.
    ///
    /// Some providers answer token endpoints (and occasionally other calls)
    /// with a query string instead of JSON.
    pub fn query_string_fallback(self, enabled: bool) -> Self {
        ResponseNormalizer {
            query_string_fallback: enabled,
        }
    }

    /// Classifies `response`.
    ///
    /// # Errors
    /// A non-2xx status yields [`Error::Api`]. A 2xx body that is neither
    /// usable JSON nor (when enabled) a query string yields [`Error::Decode`].
    pub fn normalize(&self, response: TransportResponse) -> Result<Value> {
        let status = response.status;
        debug!(%status, "classifying response");

        if status.is_success() {
            return self.decode_success(status.as_u16(), response.body);
        }

        let message = extract_error_message(&response.body);
        Err(Error::Api(ApiError {
            code: status.as_u16(),
            message,
            rate_limit: RateLimit::from_headers(&response.headers),
        }))
    }

    fn decode_success(&self, status: u16, body: String) -> Result<Value> {
        let decoded = serde_json::from_str::<Value>(&body).ok();
        match decoded {
            // a bare JSON string holding `=` is most likely a query string
            Some(Value::String(ref s)) if self.looks_like_query(&body) && s.contains('=') => {}
            Some(value) if is_usable(&value) => return Ok(value),
            _ => {}
        }

        if self.looks_like_query(&body) {
            trace!("falling back to query string parsing");
            let map = parse_query(&body)
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect::<Map<String, Value>>();
            return Ok(Value::Object(map));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Err(Error::Decode { status, body })
    }

    fn looks_like_query(&self, body: &str) -> bool {
        self.query_string_fallback && !body.is_empty() && body.contains('=')
    }
}

fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Best-effort message from an error body: JSON first, then XML, then a
/// generic text.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json_error_message(&json) {
            return message;
        }
    }
    if let Some(message) = xml_error_message(body) {
        return message;
    }
    UNRECOGNIZED_ERROR_MESSAGE.to_string()
}

fn json_error_message(json: &Value) -> Option<String> {
    let candidates = [
        json.get("detail"),
        json.get("message"),
        json.pointer("/errors/0/message"),
        json.get("error"),
    ];
    candidates
        .iter()
        .flatten()
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

// text of the first <error> child of the root element
fn xml_error_message(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_error = false;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.name().as_ref() == b"error" {
                    in_error = true;
                }
            }
            Event::End(_) => {
                if in_error && depth == 2 {
                    let text = text.trim();
                    return Some(text.to_string()).filter(|t| !t.is_empty());
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) if in_error => {
                text.push_str(&reader.decoder().decode(&e).ok()?);
            }
            Event::GeneralRef(e) if in_error => {
                let entity = reader.decoder().decode(&e).ok()?.into_owned();
                text.push_str(&decode_entity(&entity));
            }
            Event::CData(e) if in_error => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::Eof => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn decode_entity(entity: &str) -> String {
    match entity {
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "amp" => "&".to_string(),
        "apos" => "'".to_string(),
        "quot" => "\"".to_string(),
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{};", entity), |c| c.to_string())
        }
        _ => format!("&{};", entity),
    }
}
