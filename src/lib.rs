//! # Add-in OAuth
//!
//! Implicit and code-grant OAuth authentication for applications embedded
//! inside a host application (an "add-in") or running in a plain browser
//! tab.
//!
//! ## Features
//!
//! - **Endpoint registry**: typed provider configurations with built-in
//!   presets (Google, Microsoft, Facebook, Azure AD)
//! - **Three transports behind one call**: popup window, host-managed
//!   dialog, host-native auth channel
//! - **Defensive by default**: cryptographically random anti-CSRF state,
//!   validated on every redirect
//! - **Token cache**: expiry-aware, keyed per provider
//! - **Testable**: the whole round trip runs against a scripted mock host
//!
//! ## Architecture
//!
//! One `authenticate` call walks a fixed state machine:
//!
//! ```text
//! CacheCheck → EndpointLookup → TransportDispatch → AwaitRedirect
//!            → Validate → [CodeExchange] → CacheWrite → Token
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use addin_oauth::Authenticator;
//!
//! let auth = Authenticator::in_memory(host);
//! auth.endpoints().register_google_auth("client-id", None)?;
//!
//! // Opens the popup/dialog, validates the redirect, caches the token.
//! let token = auth.authenticate("Google", false).await?;
//!
//! // Second call resolves from the cache without any UI.
//! let token = auth.authenticate("Google", false).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod authenticator;
pub mod constants;
pub mod dialog;
pub mod endpoint;
pub mod error;
pub mod host;
pub mod parse;
pub mod random;
pub mod storage;
pub mod token;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use authenticator::{Authenticator, is_terminal_redirect_channel};
pub use dialog::{DialogSize, ScreenSize};
pub use endpoint::{Endpoint, EndpointManager, LoginParams, well_known};
pub use error::{AuthError, Result};
pub use host::{AuthHost, HostDialog, HostPopup, PopupState};
pub use parse::{RedirectOutcome, extract_params};
pub use storage::{MemoryStorage, Storage};
pub use token::{AuthCode, StoredTokenCache, Token, TokenCache};
