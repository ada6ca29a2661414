//! Redirect response parsing.
//!
//! Providers deliver their result as a URL fragment
//! (`https://app/redirect#access_token=...`), a query string
//! (`https://app/redirect?error=...`), or a mix of both. The parser is a
//! pure function from a redirect URL to a parameter map; classification
//! into token/code/error happens on top of it.

use crate::error::AuthError;
use crate::token::{AuthCode, Token};
use std::collections::BTreeMap;

/// Extract the `key=value` payload of a redirect URL.
///
/// `exclude` (normally the registered redirect URL) is removed from `url`
/// first. The remainder is split on `delimiter`; the payload is the second
/// segment when present and non-empty, else the first. A single
/// leading `/` is stripped, and when the payload contains `?` only the
/// part after it is parsed, which tolerates providers answering in query
/// style rather than fragment style. Pairs are `&`-joined with both key
/// and value percent-decoded; on duplicate keys the last occurrence wins.
///
/// Returns `None` when the URL contains no delimiter at all or no pairs
/// could be parsed: the caller must treat that as "not a terminal
/// redirect", never as success.
#[must_use]
pub fn extract_params(url: &str, exclude: &str, delimiter: char) -> Option<BTreeMap<String, String>> {
    let stripped = if exclude.is_empty() {
        url.to_string()
    } else {
        url.replacen(exclude, "", 1)
    };

    let segments: Vec<&str> = stripped.split(delimiter).collect();
    if segments.len() < 2 {
        return None;
    }
    let mut payload = *segments
        .get(1)
        .filter(|second| !second.is_empty())
        .unwrap_or(&segments[0]);

    payload = payload.strip_prefix('/').unwrap_or(payload);
    if let Some((_, query)) = payload.split_once('?') {
        payload = query;
    }

    let mut params = BTreeMap::new();
    for pair in payload.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        params.insert(decode(key), decode(value));
    }

    if params.is_empty() { None } else { Some(params) }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), Into::into)
}

/// Classified redirect payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectOutcome {
    /// The payload carries an `access_token` (implicit grant).
    Token(Token),

    /// The payload carries a `code` (code grant, to be exchanged).
    Code(AuthCode),

    /// Neither token nor code: a provider-reported failure.
    Error(AuthError),
}

impl RedirectOutcome {
    /// Classify a parsed parameter map.
    ///
    /// `access_token` wins over `code`; anything else is an error payload
    /// carrying whatever `error` and `state` fields were present.
    #[must_use]
    pub fn classify(params: BTreeMap<String, String>) -> Self {
        if params.contains_key("access_token") {
            return Self::Token(Token::from_params(params));
        }

        if let Some(code) = params.get("code") {
            return Self::Code(AuthCode {
                code: code.clone(),
                state: params.get("state").cloned(),
            });
        }

        Self::Error(AuthError::ProviderError {
            error: params.get("error").cloned().unwrap_or_default(),
            state: params.get("state").cloned(),
        })
    }
}
