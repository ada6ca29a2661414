//! Endpoint registry and authorize-URL construction.
//!
//! An [`Endpoint`] identifies one OAuth provider. The registry persists
//! configurations through the keyed [`Storage`] contract under the
//! `OAuth2Endpoints` namespace, and builds login parameters (authorize URL
//! plus anti-CSRF state) from them.

use crate::constants::namespaces;
use crate::error::{AuthError, Result};
use crate::random::generate_state;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};

/// Well-known provider keys used by the built-in presets.
pub mod well_known {
    /// Google Identity Platform.
    pub const GOOGLE: &str = "Google";

    /// Microsoft identity platform (v2.0).
    pub const MICROSOFT: &str = "Microsoft";

    /// Facebook Login.
    pub const FACEBOOK: &str = "Facebook";

    /// Azure Active Directory (v1 directory federation).
    pub const AZURE_AD: &str = "AzureAD";
}

/// Configuration for one OAuth provider.
///
/// No URL well-formedness validation is performed anywhere: a malformed
/// configuration surfaces later as a failed navigation or network attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    /// Unique provider key within the registry. Stamped by
    /// [`EndpointManager::add`].
    pub provider: String,

    /// OAuth client id.
    pub client_id: String,

    /// Provider base URL, e.g. `https://accounts.google.com`.
    pub base_url: String,

    /// Authorize path appended to `base_url`, e.g. `/o/oauth2/v2/auth`.
    pub authorize_url: String,

    /// Redirect URL the provider sends the user back to. Defaults to the
    /// registry's configured origin on registration and is stable after
    /// that.
    pub redirect_url: Option<String>,

    /// Token endpoint for code-grant flows. Absent means implicit flow:
    /// the redirect payload is used as-is.
    pub token_url: Option<String>,

    /// Requested scope.
    pub scope: Option<String>,

    /// Requested resource (directory-federation style providers).
    pub resource: Option<String>,

    /// Emit a generated anti-CSRF `state` parameter and require it to be
    /// echoed back.
    pub state: bool,

    /// Emit a generated `nonce` parameter.
    pub nonce: bool,

    /// The `response_type` to request, e.g. `token` or `code`.
    pub response_type: String,

    /// Raw string appended verbatim to the authorize query (not
    /// re-encoded). Must carry its own leading `&`.
    pub extra_query_parameters: Option<String>,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            provider: String::new(),
            client_id: String::new(),
            base_url: String::new(),
            authorize_url: String::new(),
            redirect_url: None,
            token_url: None,
            scope: None,
            resource: None,
            state: false,
            nonce: false,
            response_type: "token".to_string(),
            extra_query_parameters: None,
        }
    }
}

impl Endpoint {
    /// Merge `self` (the caller's overrides) over `defaults`: a field set
    /// on `self` wins, everything else falls back to the preset.
    ///
    /// The boolean `state`/`nonce` flags are or-merged: a preset that
    /// enables them cannot be disabled through overrides.
    #[must_use]
    fn merged_over(self, defaults: Self) -> Self {
        fn pick(over: String, default: String) -> String {
            if over.is_empty() { default } else { over }
        }

        Self {
            provider: pick(self.provider, defaults.provider),
            client_id: pick(self.client_id, defaults.client_id),
            base_url: pick(self.base_url, defaults.base_url),
            authorize_url: pick(self.authorize_url, defaults.authorize_url),
            redirect_url: self.redirect_url.or(defaults.redirect_url),
            token_url: self.token_url.or(defaults.token_url),
            scope: self.scope.or(defaults.scope),
            resource: self.resource.or(defaults.resource),
            state: self.state || defaults.state,
            nonce: self.nonce || defaults.nonce,
            response_type: pick(self.response_type, defaults.response_type),
            extra_query_parameters: self
                .extra_query_parameters
                .or(defaults.extra_query_parameters),
        }
    }

    /// Build the authorize URL and the anti-CSRF state for one attempt.
    ///
    /// Query parameters are assembled in a fixed order: `response_type`,
    /// `client_id`, `redirect_uri`, then optionally `scope`, `resource`,
    /// `state`, `nonce`, then `extra_query_parameters` appended verbatim.
    /// `state` and `nonce` are independently generated nonzero values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SecureRandomUnavailable`] when no secure
    /// random source exists on the platform.
    pub fn login_params(&self) -> Result<LoginParams> {
        let redirect = self.redirect_url.as_deref().unwrap_or_default();

        let mut query = vec![
            format!("response_type={}", urlencoding::encode(&self.response_type)),
            format!("client_id={}", urlencoding::encode(&self.client_id)),
            format!("redirect_uri={}", urlencoding::encode(redirect)),
        ];

        if let Some(scope) = &self.scope {
            query.push(format!("scope={}", urlencoding::encode(scope)));
        }
        if let Some(resource) = &self.resource {
            query.push(format!("resource={}", urlencoding::encode(resource)));
        }

        let state = if self.state { generate_state()? } else { 0 };
        if state != 0 {
            query.push(format!("state={state}"));
        }
        if self.nonce {
            query.push(format!("nonce={}", generate_state()?));
        }

        let mut url = format!(
            "{}{}?{}",
            self.base_url,
            self.authorize_url,
            query.join("&")
        );
        if let Some(extra) = &self.extra_query_parameters {
            url.push_str(extra);
        }

        Ok(LoginParams { url, state })
    }
}

/// Ephemeral parameters for one authenticate attempt.
///
/// `state` is the value embedded in the authorize URL and later compared
/// against the redirect's `state`; 0 means no state was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginParams {
    /// The fully assembled authorize URL.
    pub url: String,

    /// The generated anti-CSRF state, or 0 when the endpoint does not use
    /// one.
    pub state: u32,
}

/// Typed registry of provider configurations.
///
/// Registrations fully replace the previous configuration for a provider
/// key and are never auto-deleted.
#[derive(Debug, Clone)]
pub struct EndpointManager<S: Storage> {
    storage: S,
    origin: String,
}

impl<S: Storage> EndpointManager<S> {
    /// Create a registry on top of a storage backend.
    ///
    /// `origin` is the current application origin, used as the default
    /// `redirect_url` for configurations registered without one.
    pub fn new(storage: S, origin: impl Into<String>) -> Self {
        Self {
            storage,
            origin: origin.into(),
        }
    }

    fn key(provider: &str) -> String {
        format!("{}/{provider}", namespaces::ENDPOINTS)
    }

    /// Insert or overwrite a provider configuration.
    ///
    /// Stamps `provider` on the stored config and defaults `redirect_url`
    /// to the registry's origin when absent. Returns the stored config.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn add(&self, provider: &str, mut endpoint: Endpoint) -> Result<Endpoint> {
        endpoint.provider = provider.to_string();
        if endpoint.redirect_url.is_none() {
            endpoint.redirect_url = Some(self.origin.clone());
        }

        let json =
            serde_json::to_string(&endpoint).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.storage.insert(&Self::key(provider), &json)?;

        tracing::debug!(provider, "registered endpoint");
        Ok(endpoint)
    }

    /// Read a provider configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read or holds a value
    /// that no longer deserializes.
    pub fn get(&self, provider: &str) -> Result<Option<Endpoint>> {
        match self.storage.get(&Self::key(provider))? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AuthError::Storage(e.to_string())),
        }
    }

    /// Remove a provider configuration, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn remove(&self, provider: &str) -> Result<Option<Endpoint>> {
        match self.storage.remove(&Self::key(provider))? {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| AuthError::Storage(e.to_string())),
        }
    }

    /// Register a Google Identity Platform endpoint.
    ///
    /// Caller overrides win over the preset defaults. Returns the stored
    /// config.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn register_google_auth(
        &self,
        client_id: &str,
        overrides: Option<Endpoint>,
    ) -> Result<Endpoint> {
        let defaults = Endpoint {
            client_id: client_id.to_string(),
            base_url: "https://accounts.google.com".to_string(),
            authorize_url: "/o/oauth2/v2/auth".to_string(),
            scope: Some("https://www.googleapis.com/auth/plus.me".to_string()),
            state: true,
            ..Endpoint::default()
        };
        self.add(
            well_known::GOOGLE,
            overrides.unwrap_or_default().merged_over(defaults),
        )
    }

    /// Register a Microsoft identity platform (v2.0) endpoint.
    ///
    /// Caller overrides win over the preset defaults. Returns the stored
    /// config.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn register_microsoft_auth(
        &self,
        client_id: &str,
        overrides: Option<Endpoint>,
    ) -> Result<Endpoint> {
        let defaults = Endpoint {
            client_id: client_id.to_string(),
            base_url: "https://login.microsoftonline.com".to_string(),
            authorize_url: "/common/oauth2/v2.0/authorize".to_string(),
            scope: Some("https://graph.microsoft.com/user.read".to_string()),
            extra_query_parameters: Some("&response_mode=fragment".to_string()),
            state: true,
            nonce: true,
            ..Endpoint::default()
        };
        self.add(
            well_known::MICROSOFT,
            overrides.unwrap_or_default().merged_over(defaults),
        )
    }

    /// Register a Facebook Login endpoint.
    ///
    /// Caller overrides win over the preset defaults. Returns the stored
    /// config.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn register_facebook_auth(
        &self,
        client_id: &str,
        overrides: Option<Endpoint>,
    ) -> Result<Endpoint> {
        let defaults = Endpoint {
            client_id: client_id.to_string(),
            base_url: "https://www.facebook.com".to_string(),
            authorize_url: "/dialog/oauth".to_string(),
            scope: Some("public_profile".to_string()),
            state: true,
            nonce: true,
            ..Endpoint::default()
        };
        self.add(
            well_known::FACEBOOK,
            overrides.unwrap_or_default().merged_over(defaults),
        )
    }

    /// Register an Azure Active Directory endpoint.
    ///
    /// Caller overrides win over the preset defaults. Returns the stored
    /// config.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn register_azure_ad_auth(
        &self,
        client_id: &str,
        overrides: Option<Endpoint>,
    ) -> Result<Endpoint> {
        let defaults = Endpoint {
            client_id: client_id.to_string(),
            base_url: "https://login.windows.net".to_string(),
            authorize_url: "/common/oauth2/authorize".to_string(),
            resource: Some("https://graph.microsoft.com".to_string()),
            state: true,
            nonce: true,
            ..Endpoint::default()
        };
        self.add(
            well_known::AZURE_AD,
            overrides.unwrap_or_default().merged_over(defaults),
        )
    }
}
