//! Outbound request signer.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tracing::warn;

/// Bearer form of an access token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Attach `token` as the request's bearer authorization.
///
/// With no token the request is left exactly as it was. A token that is not
/// a valid header value is skipped the same way, and the server's response
/// decides what happens next.
pub fn sign(mut request: Request, token: Option<&str>) -> Request {
    let Some(token) = token else {
        return request;
    };

    match HeaderValue::from_str(&bearer(token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Err(_) => warn!("Access token is not a valid header value, sending unsigned"),
    }

    request
}
