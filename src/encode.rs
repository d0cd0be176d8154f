//! RFC 3986 percent-encoding and the sorted query serialization shared by the
//! transport and the signature base string.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::Parameters;

/// Everything except the unreserved set `A-Z a-z 0-9 - . _ ~`.
const RFC3986_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes `value` per RFC 3986.
///
/// Unlike form encoding, a space becomes `%20` and never `+`.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986_ENCODE_SET).to_string()
}

/// Reverses [`encode`]. Invalid UTF-8 sequences are replaced lossily.
pub fn decode(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}

/// Serializes key/value pairs into `k1=v1&k2=v2`.
///
/// Keys and values are encoded first, then the pairs are sorted by encoded key
/// and ties broken by encoded value, so the output does not depend on the
/// order of the input.
pub fn build_query<I, K, V>(params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs = params
        .into_iter()
        .map(|(k, v)| (encode(k.as_ref()), encode(v.as_ref())))
        .collect::<Vec<(String, String)>>();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<String>>()
        .join("&")
}

/// Parses a form-style query string into a flat parameter map.
///
/// A repeated key keeps its last value.
pub fn parse_query(query: &str) -> Parameters {
    url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .into_owned()
        .filter(|(k, _)| !k.is_empty())
        .collect()
}
