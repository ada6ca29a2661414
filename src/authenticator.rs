//! The authentication orchestrator.
//!
//! One `authenticate` call walks a fixed state machine: cache check →
//! endpoint lookup → transport dispatch → await redirect → validate →
//! optional code exchange → cache write. Exactly one terminal resolution
//! happens per call; a user closing the popup or the host failing its
//! dialog surfaces as an error, never as a forever-pending future.

use crate::constants::POPUP_POLL_INTERVAL;
use crate::dialog::DialogSize;
use crate::endpoint::{Endpoint, EndpointManager, LoginParams};
use crate::error::{AuthError, Result};
use crate::host::{AuthHost, HostDialog, HostPopup, PopupState};
use crate::parse::{RedirectOutcome, extract_params};
use crate::storage::{MemoryStorage, Storage};
use crate::token::{StoredTokenCache, Token, TokenCache};
use reqwest::{Client, StatusCode, header};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Whether `url` looks like a terminal auth redirect.
///
/// Pure marker scan: the page carries an `access_token`, `code`, or
/// `error` token somewhere in its URL.
#[must_use]
pub fn is_terminal_redirect_channel(url: &str) -> bool {
    ["access_token", "code", "error"]
        .iter()
        .any(|marker| url.contains(marker))
}

/// Drives the interactive OAuth round trip.
///
/// Generic over the embedding host, the token cache, and the storage
/// backing the endpoint registry, so the whole machine runs against mocks
/// at memory speed in tests.
pub struct Authenticator<H: AuthHost, C: TokenCache, S: Storage> {
    host: H,
    endpoints: EndpointManager<S>,
    tokens: C,
    http: Client,
    // Host capability cannot change within a process; probe once.
    dialog_capable: OnceLock<bool>,
}

impl<H: AuthHost> Authenticator<H, StoredTokenCache<MemoryStorage>, MemoryStorage> {
    /// Create an authenticator with in-memory endpoint and token stores.
    #[must_use]
    pub fn in_memory(host: H) -> Self {
        Self::new(
            host,
            MemoryStorage::new(),
            StoredTokenCache::new(MemoryStorage::new()),
        )
    }
}

impl<H: AuthHost, C: TokenCache, S: Storage> Authenticator<H, C, S> {
    /// Create an authenticator.
    ///
    /// The endpoint registry is created on top of `storage` with the
    /// host's origin as the default redirect URL.
    #[must_use]
    pub fn new(host: H, storage: S, tokens: C) -> Self {
        let origin = host.origin();
        Self {
            host,
            endpoints: EndpointManager::new(storage, origin),
            tokens,
            http: Client::new(),
            dialog_capable: OnceLock::new(),
        }
    }

    /// The endpoint registry.
    pub const fn endpoints(&self) -> &EndpointManager<S> {
        &self.endpoints
    }

    /// The token cache.
    pub const fn tokens(&self) -> &C {
        &self.tokens
    }

    /// The embedding host.
    pub const fn host(&self) -> &H {
        &self.host
    }

    fn dialog_capable(&self) -> bool {
        *self
            .dialog_capable
            .get_or_init(|| self.host.supports_dialog())
    }

    /// Authenticate against a registered provider.
    ///
    /// Returns the cached token when one exists, has not expired, and
    /// `force` is false; otherwise runs the interactive round trip over
    /// the host dialog (rich host) or a popup window (plain browser),
    /// caches the resulting token, and returns it.
    ///
    /// Concurrent calls for the same provider are neither deduplicated
    /// nor serialized; each opens its own transport instance.
    ///
    /// # Errors
    ///
    /// Rejects with the taxonomy in [`AuthError`]: unknown provider,
    /// transport failure (popup closed, dialog failed), forged or
    /// malformed redirect (state mismatch, unparseable payload, provider
    /// error), or a failed code exchange.
    pub async fn authenticate(&self, provider: &str, force: bool) -> Result<Token> {
        let (endpoint, login) = match self.prepare(provider, force)? {
            Prepared::Cached(token) => return Ok(token),
            Prepared::Login(endpoint, login) => (endpoint, login),
        };

        let raw = if self.dialog_capable() {
            tracing::debug!(provider, "dispatching host dialog transport");
            self.dialog_flow(&login).await?
        } else {
            tracing::debug!(provider, "dispatching popup transport");
            self.popup_flow(&endpoint, &login).await?
        };

        self.finish_login(&endpoint, &login, &raw).await
    }

    /// Authenticate over the host-native auth channel.
    ///
    /// Same contract as [`authenticate`](Self::authenticate), but the
    /// transport is pinned to the collaboration-suite host's own
    /// authentication API regardless of dialog capability.
    ///
    /// # Errors
    ///
    /// As [`authenticate`](Self::authenticate); the host's failure
    /// callback surfaces as [`AuthError::NativeChannelFailed`].
    pub async fn use_native_auth_channel(&self, provider: &str, force: bool) -> Result<Token> {
        let (endpoint, login) = match self.prepare(provider, force)? {
            Prepared::Cached(token) => return Ok(token),
            Prepared::Login(endpoint, login) => (endpoint, login),
        };

        tracing::debug!(provider, "dispatching host-native auth channel");
        let size = DialogSize::for_screen(self.host.screen());
        let raw = self.host.request_native_auth(&login.url, &size).await?;

        self.finish_login(&endpoint, &login, &raw).await
    }

    /// CacheCheck and EndpointLookup, shared by both entry points.
    fn prepare(&self, provider: &str, force: bool) -> Result<Prepared> {
        if !force {
            if let Some(cached) = self.tokens.get(provider)? {
                if cached.has_expired() {
                    tracing::debug!(provider, "cached token has expired");
                } else {
                    tracing::debug!(provider, "returning cached token");
                    return Ok(Prepared::Cached(cached));
                }
            }
        }

        let endpoint = self
            .endpoints
            .get(provider)?
            .ok_or_else(|| AuthError::UnknownEndpoint(provider.to_string()))?;
        let login = endpoint.login_params()?;

        Ok(Prepared::Login(endpoint, login))
    }

    /// Popup transport: poll the window every 400 ms until it lands on
    /// the registered redirect URL or disappears.
    async fn popup_flow(&self, endpoint: &Endpoint, login: &LoginParams) -> Result<String> {
        let size = DialogSize::for_screen(self.host.screen());
        let mut popup = self.host.open_popup(&login.url, &size)?;
        let redirect_prefix = endpoint.redirect_url.clone().unwrap_or_default();

        let mut ticks = tokio::time::interval(POPUP_POLL_INTERVAL);
        loop {
            ticks.tick().await;
            match popup.poll() {
                PopupState::Closed => return Err(AuthError::PopupClosed),
                PopupState::Foreign => {}
                PopupState::At(url) => {
                    if url.starts_with(&redirect_prefix) {
                        popup.close();
                        return Ok(url);
                    }
                }
            }
        }
    }

    /// Host-dialog transport: await the single message, then close the
    /// dialog immediately, before any validation.
    async fn dialog_flow(&self, login: &LoginParams) -> Result<String> {
        let size = DialogSize::for_screen(self.host.screen());
        let mut dialog = self.host.open_dialog(&login.url, &size).await?;

        let message = dialog.await_message().await;
        dialog.close();
        message
    }

    /// Validate → optional CodeExchange → CacheWrite.
    ///
    /// The anti-CSRF state check runs on every parsed payload, before
    /// classification: an error payload carrying a wrong or missing
    /// `state` rejects as a state mismatch, not as a provider error.
    async fn finish_login(
        &self,
        endpoint: &Endpoint,
        login: &LoginParams,
        raw: &str,
    ) -> Result<Token> {
        let exclude = endpoint.redirect_url.as_deref().unwrap_or_default();
        let params = extract_params(raw, exclude, '#').ok_or(AuthError::TokenNotParsed)?;

        verify_state(endpoint, login, params.get("state").map(String::as_str))?;

        match RedirectOutcome::classify(params) {
            RedirectOutcome::Error(error) => Err(error),
            RedirectOutcome::Token(token) => self.tokens.insert(&endpoint.provider, token),
            RedirectOutcome::Code(code) => {
                let payload = serde_json::to_value(&code)
                    .map_err(|e| AuthError::ResponseParse(e.to_string()))?;
                let token = self.exchange_code_for_token(endpoint, payload, None).await?;
                self.tokens.insert(&endpoint.provider, token)
            }
        }
    }

    /// Exchange an authorization code payload for a token.
    ///
    /// POSTs the payload as JSON to the endpoint's `token_url` with
    /// `Accept`/`Content-Type: application/json`; caller-supplied values
    /// for those two headers are ignored, everything else is forwarded.
    /// When the endpoint has no `token_url`, the payload itself is
    /// returned as the final credential, since some providers hand back a
    /// ready-to-use value with no token endpoint.
    ///
    /// Exposed independently for callers implementing custom flows; this
    /// method does not touch the token cache.
    ///
    /// # Errors
    ///
    /// [`AuthError::Network`] on request failure,
    /// [`AuthError::ExchangeFailed`] on a non-200 status,
    /// [`AuthError::ResponseParse`] when the body is not a token
    /// structure, and [`AuthError::TokenNotParsed`] when a 200 body
    /// carries no `access_token`.
    pub async fn exchange_code_for_token(
        &self,
        endpoint: &Endpoint,
        payload: serde_json::Value,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<Token> {
        let Some(token_url) = endpoint.token_url.as_deref() else {
            tracing::warn!(
                provider = %endpoint.provider,
                "no token_url configured, returning code payload as the credential"
            );
            return serde_json::from_value(payload)
                .map_err(|e| AuthError::ResponseParse(e.to_string()));
        };

        let mut request = self
            .http
            .post(token_url)
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(extra) = headers {
            for (name, value) in extra {
                if name.eq_ignore_ascii_case("accept") || name.eq_ignore_ascii_case("content-type")
                {
                    continue;
                }
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request
            .json(&payload)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| AuthError::Network(e.to_string()))?;
                let token: Token = serde_json::from_str(&body)
                    .map_err(|e| AuthError::ResponseParse(e.to_string()))?;

                if token.access_token.is_none() {
                    tracing::error!(%body, "token endpoint answered 200 without an access_token");
                    return Err(AuthError::TokenNotParsed);
                }
                Ok(token)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, %body, "code exchange failed");
                Err(AuthError::ExchangeFailed {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Whether the current page is a terminal auth redirect rendered
    /// inside a host-managed dialog.
    ///
    /// When it is, the current URL is forwarded to the parent/host as a
    /// side effect, so host bootstrap code can avoid rendering the full
    /// application inside the transient dialog.
    ///
    /// # Errors
    ///
    /// Returns error when forwarding to the host fails.
    pub fn is_auth_dialog(&self) -> Result<bool> {
        if !self.dialog_capable() {
            return Ok(false);
        }

        let url = self.host.page_url();
        if !is_terminal_redirect_channel(&url) {
            return Ok(false);
        }

        self.host.forward_message(&url)?;
        Ok(true)
    }
}

/// Outcome of the CacheCheck/EndpointLookup phase.
enum Prepared {
    Cached(Token),
    Login(Endpoint, LoginParams),
}

/// Anti-CSRF check: when the endpoint emits a `state`, the redirect's
/// `state` must numerically equal the value generated for this attempt.
fn verify_state(endpoint: &Endpoint, login: &LoginParams, returned: Option<&str>) -> Result<()> {
    if !endpoint.state {
        return Ok(());
    }

    let matches = returned
        .and_then(|raw| raw.parse::<u32>().ok())
        .is_some_and(|value| value == login.state);

    if matches {
        Ok(())
    } else {
        Err(AuthError::StateMismatch {
            returned: returned.map(ToString::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::well_known;
    use crate::mocks::{DialogScript, MockHost, NativeScript, PopupScript};
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ORIGIN: &str = "https://app.example.com";

    fn popup_authenticator(
        script: PopupScript,
    ) -> Authenticator<MockHost, StoredTokenCache<MemoryStorage>, MemoryStorage> {
        let host = MockHost::new().with_popup_script(script);
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();
        auth
    }

    #[tokio::test]
    async fn test_popup_flow_resolves_and_caches_token() {
        let auth = popup_authenticator(PopupScript::TokenRedirect {
            access_token: "ABC".to_string(),
        });

        let token = auth.authenticate(well_known::GOOGLE, false).await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("ABC"));
        assert_eq!(token.provider, well_known::GOOGLE);

        let cached = auth.tokens().get(well_known::GOOGLE).unwrap().unwrap();
        assert_eq!(cached.access_token.as_deref(), Some("ABC"));
        assert_eq!(auth.host().popups_opened(), 1);
        assert_eq!(auth.host().dialogs_opened(), 0);
    }

    #[tokio::test]
    async fn test_cached_token_short_circuits_transport() {
        let auth = popup_authenticator(PopupScript::TokenRedirect {
            access_token: "ABC".to_string(),
        });

        let first = auth.authenticate(well_known::GOOGLE, false).await.unwrap();
        let second = auth.authenticate(well_known::GOOGLE, false).await.unwrap();

        assert_eq!(first.access_token, second.access_token);
        assert_eq!(auth.host().popups_opened(), 1);
    }

    #[tokio::test]
    async fn test_force_reruns_transport() {
        let auth = popup_authenticator(PopupScript::TokenRedirect {
            access_token: "ABC".to_string(),
        });

        auth.authenticate(well_known::GOOGLE, false).await.unwrap();
        auth.authenticate(well_known::GOOGLE, true).await.unwrap();

        assert_eq!(auth.host().popups_opened(), 2);
    }

    #[tokio::test]
    async fn test_expired_cached_token_reruns_transport() {
        let auth = popup_authenticator(PopupScript::TokenRedirect {
            access_token: "fresh".to_string(),
        });
        auth.tokens()
            .insert(
                well_known::GOOGLE,
                Token {
                    access_token: Some("stale".to_string()),
                    expires_at: Some(chrono::Utc::now() - chrono::Duration::minutes(5)),
                    ..Token::default()
                },
            )
            .unwrap();

        let token = auth.authenticate(well_known::GOOGLE, false).await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("fresh"));
        assert_eq!(auth.host().popups_opened(), 1);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_rejects_without_transport() {
        let auth = Authenticator::in_memory(MockHost::new());

        let err = auth.authenticate("Nope", false).await.unwrap_err();
        assert_eq!(err, AuthError::UnknownEndpoint("Nope".to_string()));
        assert_eq!(auth.host().popups_opened(), 0);
        assert_eq!(auth.host().dialogs_opened(), 0);
    }

    #[tokio::test]
    async fn test_popup_closed_by_user_rejects() {
        let auth = popup_authenticator(PopupScript::ClosedByUser);

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert_eq!(err, AuthError::PopupClosed);
    }

    #[tokio::test]
    async fn test_popup_blocked_rejects() {
        let auth = popup_authenticator(PopupScript::Blocked);

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert!(matches!(err, AuthError::PopupBlocked(_)));
    }

    #[tokio::test]
    async fn test_state_mismatch_rejects_and_does_not_cache() {
        // The scripted redirect carries a fixed state that cannot match
        // the freshly generated one.
        let auth = popup_authenticator(PopupScript::Navigate(format!(
            "{ORIGIN}#access_token=ABC&state=999"
        )));

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { .. }));
        assert_eq!(err.state(), Some("999"));
        assert!(auth.tokens().get(well_known::GOOGLE).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_payload_with_bad_state_rejects_as_mismatch() {
        // State verification precedes classification, so a provider error
        // carrying a forged state surfaces as the anti-CSRF failure.
        let auth = popup_authenticator(PopupScript::Navigate(format!(
            "{ORIGIN}#error=access_denied&state=999"
        )));

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::StateMismatch {
                returned: Some("999".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_provider_error_payload_rejects() {
        // Endpoint without state enabled: the error payload itself is the
        // rejection.
        let host = MockHost::new().with_popup_script(PopupScript::Navigate(format!(
            "{ORIGIN}#error=access_denied"
        )));
        let auth = Authenticator::in_memory(host);
        auth.endpoints()
            .add(
                "Plain",
                Endpoint {
                    client_id: "client-123".to_string(),
                    base_url: "https://auth.example.com".to_string(),
                    authorize_url: "/authorize".to_string(),
                    ..Endpoint::default()
                },
            )
            .unwrap();

        let err = auth.authenticate("Plain", false).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::ProviderError {
                error: "access_denied".to_string(),
                state: None,
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_redirect_rejects() {
        let auth = popup_authenticator(PopupScript::Navigate(ORIGIN.to_string()));

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert_eq!(err, AuthError::TokenNotParsed);
    }

    #[tokio::test]
    async fn test_dialog_transport_used_when_capable() {
        let host = MockHost::new()
            .with_dialog_api(true)
            .with_dialog_script(DialogScript::TokenMessage {
                access_token: "DLG".to_string(),
            });
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();

        let token = auth.authenticate(well_known::GOOGLE, false).await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("DLG"));
        assert_eq!(auth.host().dialogs_opened(), 1);
        assert_eq!(auth.host().popups_opened(), 0);
    }

    #[tokio::test]
    async fn test_dialog_failure_rejects() {
        let host = MockHost::new()
            .with_dialog_api(true)
            .with_dialog_script(DialogScript::Failure("channel broke".to_string()));
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();

        let err = auth.authenticate(well_known::GOOGLE, false).await.unwrap_err();
        assert_eq!(err, AuthError::DialogFailed("channel broke".to_string()));
    }

    #[tokio::test]
    async fn test_native_channel_success() {
        let host = MockHost::new().with_native_script(NativeScript::TokenMessage {
            access_token: "NAT".to_string(),
        });
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();

        let token = auth
            .use_native_auth_channel(well_known::GOOGLE, false)
            .await
            .unwrap();
        assert_eq!(token.access_token.as_deref(), Some("NAT"));
        assert_eq!(auth.host().native_requests(), 1);
        assert_eq!(auth.host().popups_opened(), 0);
        assert_eq!(auth.host().dialogs_opened(), 0);
    }

    #[tokio::test]
    async fn test_native_channel_failure_callback() {
        let host =
            MockHost::new().with_native_script(NativeScript::Failure("cancelled".to_string()));
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();

        let err = auth
            .use_native_auth_channel(well_known::GOOGLE, false)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NativeChannelFailed("cancelled".to_string()));
    }

    #[tokio::test]
    async fn test_native_channel_respects_cache() {
        let host = MockHost::new().with_native_script(NativeScript::TokenMessage {
            access_token: "NAT".to_string(),
        });
        let auth = Authenticator::in_memory(host);
        auth.endpoints().register_google_auth("client-123", None).unwrap();

        auth.use_native_auth_channel(well_known::GOOGLE, false)
            .await
            .unwrap();
        auth.use_native_auth_channel(well_known::GOOGLE, false)
            .await
            .unwrap();

        assert_eq!(auth.host().native_requests(), 1);
    }

    // ═══════════════════════════════════════════════════════════
    // Code exchange
    // ═══════════════════════════════════════════════════════════

    fn code_endpoint(token_url: String) -> Endpoint {
        Endpoint {
            provider: "CodeProvider".to_string(),
            client_id: "client-123".to_string(),
            base_url: "https://auth.example.com".to_string(),
            authorize_url: "/authorize".to_string(),
            redirect_url: Some(ORIGIN.to_string()),
            token_url: Some(token_url),
            response_type: "code".to_string(),
            ..Endpoint::default()
        }
    }

    #[tokio::test]
    async fn test_code_flow_exchanges_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_matcher("accept", "application/json"))
            .and(header_matcher("content-type", "application/json"))
            .and(body_json(serde_json::json!({ "code": "XYZ" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "access_token": "X", "expires_in": 3600 }),
            ))
            .mount(&server)
            .await;

        let host = MockHost::new()
            .with_popup_script(PopupScript::Navigate(format!("{ORIGIN}#code=XYZ")));
        let auth = Authenticator::in_memory(host);
        auth.endpoints()
            .add("CodeProvider", code_endpoint(format!("{}/token", server.uri())))
            .unwrap();

        let token = auth.authenticate("CodeProvider", false).await.unwrap();
        assert_eq!(token.access_token.as_deref(), Some("X"));

        let cached = auth.tokens().get("CodeProvider").unwrap().unwrap();
        assert_eq!(cached.access_token.as_deref(), Some("X"));
        assert_eq!(cached.provider, "CodeProvider");
        assert!(cached.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_exchange_non_200_rejects_without_cache_write() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let host = MockHost::new()
            .with_popup_script(PopupScript::Navigate(format!("{ORIGIN}#code=XYZ")));
        let auth = Authenticator::in_memory(host);
        auth.endpoints()
            .add("CodeProvider", code_endpoint(format!("{}/token", server.uri())))
            .unwrap();

        let err = auth.authenticate("CodeProvider", false).await.unwrap_err();
        assert!(matches!(err, AuthError::ExchangeFailed { status: 401, .. }));
        assert!(auth.tokens().get("CodeProvider").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exchange_200_without_access_token_rejects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "scope": "email" })),
            )
            .mount(&server)
            .await;

        let auth = Authenticator::in_memory(MockHost::new());
        let endpoint = code_endpoint(format!("{}/token", server.uri()));

        let err = auth
            .exchange_code_for_token(&endpoint, serde_json::json!({ "code": "XYZ" }), None)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::TokenNotParsed);
    }

    #[tokio::test]
    async fn test_exchange_unparseable_body_rejects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let auth = Authenticator::in_memory(MockHost::new());
        let endpoint = code_endpoint(format!("{}/token", server.uri()));

        let err = auth
            .exchange_code_for_token(&endpoint, serde_json::json!({ "code": "XYZ" }), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ResponseParse(_)));
    }

    #[tokio::test]
    async fn test_exchange_network_failure_rejects() {
        let auth = Authenticator::in_memory(MockHost::new());
        // Nothing listens here.
        let endpoint = code_endpoint("http://127.0.0.1:1/token".to_string());

        let err = auth
            .exchange_code_for_token(&endpoint, serde_json::json!({ "code": "XYZ" }), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
    }

    #[tokio::test]
    async fn test_exchange_caller_headers_forwarded_but_not_content_negotiation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_matcher("accept", "application/json"))
            .and(header_matcher("x-request-source", "addin"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "X" })),
            )
            .mount(&server)
            .await;

        let auth = Authenticator::in_memory(MockHost::new());
        let endpoint = code_endpoint(format!("{}/token", server.uri()));

        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "text/html".to_string());
        headers.insert("X-Request-Source".to_string(), "addin".to_string());

        let token = auth
            .exchange_code_for_token(
                &endpoint,
                serde_json::json!({ "code": "XYZ" }),
                Some(&headers),
            )
            .await
            .unwrap();
        assert_eq!(token.access_token.as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_exchange_without_token_url_returns_payload() {
        let auth = Authenticator::in_memory(MockHost::new());
        let endpoint = Endpoint {
            provider: "CodeProvider".to_string(),
            redirect_url: Some(ORIGIN.to_string()),
            ..Endpoint::default()
        };

        let token = auth
            .exchange_code_for_token(
                &endpoint,
                serde_json::json!({ "code": "XYZ", "state": "42" }),
                None,
            )
            .await
            .unwrap();
        assert!(token.access_token.is_none());
        assert_eq!(
            token.extra.get("code"),
            Some(&serde_json::Value::String("XYZ".to_string()))
        );
    }

    // ═══════════════════════════════════════════════════════════
    // Terminal redirect detection
    // ═══════════════════════════════════════════════════════════

    #[test]
    fn test_is_terminal_redirect_channel() {
        assert!(is_terminal_redirect_channel(
            "https://app.example.com#access_token=ABC"
        ));
        assert!(is_terminal_redirect_channel(
            "https://app.example.com?code=XYZ"
        ));
        assert!(is_terminal_redirect_channel(
            "https://app.example.com?error=denied"
        ));
        assert!(!is_terminal_redirect_channel("https://app.example.com/home"));
    }

    #[tokio::test]
    async fn test_is_auth_dialog_forwards_terminal_url() {
        let host = MockHost::new()
            .with_dialog_api(true)
            .with_page_url(format!("{ORIGIN}#access_token=ABC&state=1"));
        let auth = Authenticator::in_memory(host);

        assert!(auth.is_auth_dialog().unwrap());
        assert_eq!(
            auth.host().forwarded(),
            vec![format!("{ORIGIN}#access_token=ABC&state=1")]
        );
    }

    #[tokio::test]
    async fn test_is_auth_dialog_false_outside_host() {
        let host = MockHost::new().with_page_url(format!("{ORIGIN}#access_token=ABC"));
        let auth = Authenticator::in_memory(host);

        assert!(!auth.is_auth_dialog().unwrap());
        assert!(auth.host().forwarded().is_empty());
    }

    #[tokio::test]
    async fn test_is_auth_dialog_false_without_markers() {
        let host = MockHost::new()
            .with_dialog_api(true)
            .with_page_url(format!("{ORIGIN}/home"));
        let auth = Authenticator::in_memory(host);

        assert!(!auth.is_auth_dialog().unwrap());
        assert!(auth.host().forwarded().is_empty());
    }
}
