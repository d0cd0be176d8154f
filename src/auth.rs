use http::header::{HeaderValue, AUTHORIZATION};
use http::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::encode::encode;
use crate::{
    Error, OAuthParameters, Parameters, Result, SecretsProvider, SignedRequest, Signer,
    OAUTH_SIGNATURE_KEY,
};

/// How a request proves its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// OAuth 1.0a HMAC-SHA1 signature, acting as the current user token.
    #[default]
    OAuth,
    /// Static app-only `Authorization: Bearer` header.
    Bearer,
}

/// Authenticates `request` in place.
///
/// In OAuth mode a `GET` carries the protocol parameters and the signature in
/// its body (sent as the query string); any other method signs body and
/// protocol parameters together but sends only the protocol parameters, in an
/// `Authorization: OAuth ...` header, leaving the body untouched. Query pairs
/// on a non-`GET` URL stay there and are signed with the body.
///
/// # Errors
/// Fails when bearer mode is requested without a bearer token, or when a
/// header value cannot be represented.
pub fn authenticate<TSecretsProvider>(
    request: &mut SignedRequest,
    mode: AuthMode,
    secrets: &TSecretsProvider,
    parameters: OAuthParameters<'_>,
) -> Result<()>
where
    TSecretsProvider: SecretsProvider,
{
    match mode {
        AuthMode::Bearer => {
            let token = secrets
                .get_bearer_token()
                .ok_or(Error::MissingBearerToken)?;
            let value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            request.headers.insert(AUTHORIZATION, value);
        }
        AuthMode::OAuth => sign_request(request, secrets, parameters)?,
    }
    Ok(())
}

fn sign_request<TSecretsProvider>(
    request: &mut SignedRequest,
    secrets: &TSecretsProvider,
    parameters: OAuthParameters<'_>,
) -> Result<()>
where
    TSecretsProvider: SecretsProvider,
{
    let signer = Signer::new(secrets, parameters);
    let mut oauth_params = signer.oauth_parameters();

    if request.method == Method::GET {
        request.body.append(&mut oauth_params);
        let signature = signer.generate_signature(&request.method, &request.url, &request.body)?;
        request
            .body
            .insert(OAUTH_SIGNATURE_KEY.to_string(), signature);
    } else {
        let mut signed = request.body.clone();
        for (k, v) in url_query(&request.url) {
            signed.entry(k).or_insert(v);
        }
        signed.extend(oauth_params.clone());
        let signature = signer.generate_signature(&request.method, &request.url, &signed)?;
        oauth_params.insert(OAUTH_SIGNATURE_KEY.to_string(), signature);

        let header = HeaderValue::from_str(&authorization_header(&oauth_params))?;
        request.headers.insert(AUTHORIZATION, header);
    }
    Ok(())
}

// pairs of the query string still on the request URL
fn url_query(url: &str) -> Parameters {
    match Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().into_owned().collect(),
        Err(_) => Parameters::new(),
    }
}

// OAuth k1="v1", k2="v2"
fn authorization_header<'a, I>(oauth_params: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let pairs = oauth_params
        .into_iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
        .collect::<Vec<String>>();
    format!("OAuth {}", pairs.join(", "))
}
