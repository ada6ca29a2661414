//! Error types for authentication operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the authentication round trip.
///
/// Every failure mode of `authenticate` / `exchange_code_for_token` maps
/// onto exactly one variant here, organized by category: configuration,
/// transport, protocol, and network/exchange. None of these are retried
/// automatically; a failed attempt requires the caller to re-invoke
/// `authenticate`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════

    /// No endpoint is registered under the requested provider key.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The platform exposes no cryptographically secure random source.
    ///
    /// This is fatal by design: anti-CSRF state values must never fall
    /// back to a weak generator.
    #[error("No secure random source available: {0}")]
    SecureRandomUnavailable(String),

    // ═══════════════════════════════════════════════════════════
    // Transport Errors
    // ═══════════════════════════════════════════════════════════

    /// The browser refused to open the popup window.
    #[error("Popup failed to open: {0}")]
    PopupBlocked(String),

    /// The user closed the popup before a terminal redirect was observed.
    #[error("Popup was closed before authentication completed")]
    PopupClosed,

    /// The host dialog failed to open or its message channel broke.
    #[error("Host dialog failed: {0}")]
    DialogFailed(String),

    /// The host-native auth channel invoked its failure callback.
    #[error("Host auth channel failed: {0}")]
    NativeChannelFailed(String),

    // ═══════════════════════════════════════════════════════════
    // Protocol Errors
    // ═══════════════════════════════════════════════════════════

    /// The redirect payload yielded no access token, code, or error.
    #[error("No access_token or code could be parsed from the response")]
    TokenNotParsed,

    /// The `state` returned in the redirect does not match the value
    /// generated for this attempt (anti-CSRF check).
    #[error("State verification failed: returned state {returned:?} does not match")]
    StateMismatch {
        /// The `state` value the provider sent back, if any.
        returned: Option<String>,
    },

    /// The provider reported an error in the redirect payload.
    #[error("Provider returned an error: {error}")]
    ProviderError {
        /// The provider's `error` field.
        error: String,
        /// The provider's `state` field, if present.
        state: Option<String>,
    },

    // ═══════════════════════════════════════════════════════════
    // Network / Exchange Errors
    // ═══════════════════════════════════════════════════════════

    /// The code-exchange request failed at the network layer.
    #[error("Network error: {0}")]
    Network(String),

    /// The token endpoint answered with a non-200 status.
    #[error("Code exchange failed with status {status}")]
    ExchangeFailed {
        /// HTTP status code returned by the token endpoint.
        status: u16,
        /// Response body, when one could be read.
        body: String,
    },

    /// The response body could not be parsed as a token structure.
    #[error("An error occurred while parsing the response: {0}")]
    ResponseParse(String),

    // ═══════════════════════════════════════════════════════════
    // Storage Errors
    // ═══════════════════════════════════════════════════════════

    /// The backing keyed storage failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Returns the provider-returned `state` carried by this error, if any.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::StateMismatch { returned: state } | Self::ProviderError { state, .. } => {
                state.as_deref()
            }
            _ => None,
        }
    }

    /// Returns `true` if this error came from the transport layer
    /// (popup, host dialog, or native channel).
    #[must_use]
    pub const fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::PopupBlocked(_)
                | Self::PopupClosed
                | Self::DialogFailed(_)
                | Self::NativeChannelFailed(_)
        )
    }

    /// Returns `true` if this error indicates a malformed or forged
    /// redirect response rather than an operational failure.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::TokenNotParsed | Self::StateMismatch { .. } | Self::ProviderError { .. }
        )
    }
}
