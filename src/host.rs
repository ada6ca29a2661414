//! Host capability boundary.
//!
//! These traits are the seam between the authentication state machine and
//! whatever is embedding it: a plain browser tab, a rich host with a
//! managed dialog API, or a collaboration-suite host with its own auth
//! channel. The machine never talks to a window system directly; it only
//! drives these contracts.

use crate::dialog::{DialogSize, ScreenSize};
use crate::error::Result;
use std::future::Future;

/// What the popup transport observed on one poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupState {
    /// The popup currently sits at this URL.
    At(String),

    /// The popup is open but its location is not readable (typically
    /// cross-origin, while the user is still on the provider's pages).
    Foreign,

    /// The popup has been closed.
    Closed,
}

/// A popup window opened by the host.
///
/// The transport polls [`poll`](Self::poll) on a fixed interval until the
/// popup lands on the registered redirect URL or disappears.
pub trait HostPopup: Send {
    /// Observe the popup's current state.
    fn poll(&mut self) -> PopupState;

    /// Close the popup. Idempotent.
    fn close(&mut self);
}

/// A host-managed modal dialog.
///
/// The host delivers at most one message for the dialog's lifetime; the
/// transport closes the dialog immediately after receiving it, before any
/// validation happens.
pub trait HostDialog: Send {
    /// Wait for the single message the host delivers.
    ///
    /// # Errors
    ///
    /// Returns error if the dialog's message channel fails before a
    /// message arrives.
    fn await_message(&mut self) -> impl Future<Output = Result<String>> + Send;

    /// Close the dialog. Idempotent.
    fn close(&mut self);
}

/// The embedding host.
///
/// One implementation exists per runtime context. Capability probing
/// ([`supports_dialog`](Self::supports_dialog)) is called once per
/// authenticator and cached for the process lifetime; host capability
/// cannot change within a process.
pub trait AuthHost: Send + Sync {
    /// Popup window handle type.
    type Popup: HostPopup;

    /// Host dialog handle type.
    type Dialog: HostDialog;

    /// Whether the rich host's dialog API is available.
    fn supports_dialog(&self) -> bool;

    /// Screen dimensions, used for dialog sizing.
    fn screen(&self) -> ScreenSize;

    /// The current application origin; default `redirect_url` for
    /// registrations that omit one.
    fn origin(&self) -> String;

    /// The URL of the current page, used by the terminal-redirect check.
    fn page_url(&self) -> String;

    /// Open a popup window at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::PopupBlocked`] when the window cannot
    /// be opened.
    fn open_popup(&self, url: &str, size: &DialogSize) -> Result<Self::Popup>;

    /// Open a host-managed dialog at `url`, sized as a percentage of the
    /// screen.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthError::DialogFailed`] when the host refuses
    /// to open the dialog.
    fn open_dialog(
        &self,
        url: &str,
        size: &DialogSize,
    ) -> impl Future<Output = Result<Self::Dialog>> + Send;

    /// Delegate the round trip to the host's own auth channel, supplying
    /// pixel dimensions. Resolves with the raw redirect message; the
    /// host's failure callback maps to
    /// [`crate::AuthError::NativeChannelFailed`].
    ///
    /// # Errors
    ///
    /// Returns error when the host reports a transport-level failure,
    /// such as the user cancelling.
    fn request_native_auth(
        &self,
        url: &str,
        size: &DialogSize,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Forward a terminal redirect URL to the parent/host, so host
    /// bootstrap code can skip rendering the application inside the
    /// transient dialog page.
    ///
    /// # Errors
    ///
    /// Returns error when the host message channel fails.
    fn forward_message(&self, url: &str) -> Result<()>;
}
