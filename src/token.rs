//! Token model and the token cache contract.
//!
//! Tokens are keyed 1:1 by provider: a new grant fully replaces the old
//! one. The cache never evicts proactively; expiry is evaluated lazily on
//! read via [`Token::has_expired`].

use crate::constants::namespaces;
use crate::error::{AuthError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A token issued by an OAuth provider.
///
/// Beyond `access_token` the shape is provider-defined; unknown fields are
/// kept verbatim in [`extra`](Self::extra). `access_token` is optional
/// because endpoints without a `token_url` hand back the raw code payload
/// as the final credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Token {
    /// Provider key this token was issued for. Stamped on cache insert.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    /// The access token itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token type reported by the provider (usually `Bearer`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Lifetime in seconds, as reported by the provider.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_seconds"
    )]
    pub expires_in: Option<i64>,

    /// Absolute expiry, stamped on cache insert from `expires_in` when the
    /// provider did not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// The `state` echoed back in the redirect, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Any further provider-supplied fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Token {
    /// Build a token from a parsed redirect parameter map.
    ///
    /// Known fields are lifted into their typed slots; everything else
    /// lands in [`extra`](Self::extra).
    #[must_use]
    pub fn from_params(params: BTreeMap<String, String>) -> Self {
        let mut token = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "access_token" => token.access_token = Some(value),
                "token_type" => token.token_type = Some(value),
                "expires_in" => token.expires_in = value.parse().ok(),
                "state" => token.state = Some(value),
                _ => {
                    token.extra.insert(key, serde_json::Value::String(value));
                }
            }
        }
        token
    }

    /// Whether this token's embedded expiry has elapsed.
    ///
    /// A token with no expiry metadata is treated as never-expired.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// Providers disagree on whether `expires_in` is a number or a string.
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<Seconds>::deserialize(deserializer)? {
        None => None,
        Some(Seconds::Number(n)) => Some(n),
        Some(Seconds::Text(s)) => s.parse().ok(),
    })
}

/// Intermediate artifact of a code-grant flow.
///
/// Never cached; immediately exchanged for a [`Token`] (or returned as-is
/// when the endpoint has no token endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCode {
    /// The authorization code.
    pub code: String,

    /// The `state` echoed back in the redirect, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Token cache.
///
/// Keyed store of issued tokens, one per provider. Inserts fully replace
/// the previous value for the key.
pub trait TokenCache: Send + Sync {
    /// Read the cached token for a provider.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read.
    fn get(&self, provider: &str) -> Result<Option<Token>>;

    /// Cache a token under a provider key, returning the stored value.
    ///
    /// Stamps `provider` on the token, and derives `expires_at` from
    /// `expires_in` when the provider did not send an absolute expiry.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    fn insert(&self, provider: &str, token: Token) -> Result<Token>;

    /// Drop the cached token for a provider, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    fn remove(&self, provider: &str) -> Result<Option<Token>>;
}

/// Token cache persisted through the keyed [`Storage`] contract, under the
/// `OAuth2Tokens` namespace.
#[derive(Debug, Clone)]
pub struct StoredTokenCache<S: Storage> {
    storage: S,
}

impl<S: Storage> StoredTokenCache<S> {
    /// Create a token cache on top of a storage backend.
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    fn key(provider: &str) -> String {
        format!("{}/{provider}", namespaces::TOKENS)
    }
}

impl<S: Storage> TokenCache for StoredTokenCache<S> {
    fn get(&self, provider: &str) -> Result<Option<Token>> {
        match self.storage.get(&Self::key(provider))? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AuthError::Storage(e.to_string())),
        }
    }

    fn insert(&self, provider: &str, mut token: Token) -> Result<Token> {
        token.provider = provider.to_string();
        if token.expires_at.is_none() {
            if let Some(seconds) = token.expires_in {
                token.expires_at = Some(Utc::now() + chrono::Duration::seconds(seconds));
            }
        }

        let json = serde_json::to_string(&token).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.storage.insert(&Self::key(provider), &json)?;
        Ok(token)
    }

    fn remove(&self, provider: &str) -> Result<Option<Token>> {
        match self.storage.remove(&Self::key(provider))? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AuthError::Storage(e.to_string())),
        }
    }
}
