//! Scripted mock host for testing.

use crate::dialog::{DialogSize, ScreenSize};
use crate::error::{AuthError, Result};
use crate::host::{AuthHost, HostDialog, HostPopup, PopupState};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// What the mock popup does after opening.
#[derive(Debug, Clone)]
pub enum PopupScript {
    /// Sit on a provider page for one tick, then land on the registered
    /// redirect carrying this token. Echoes back the `state` embedded
    /// in the login URL, exercising the round-trip check.
    TokenRedirect {
        /// The `access_token` to put in the redirect fragment.
        access_token: String,
    },

    /// Sit on a provider page for one tick, then land on a fixed URL.
    Navigate(String),

    /// The user closes the window before any redirect is observed.
    ClosedByUser,

    /// The window fails to open at all.
    Blocked,
}

/// What the mock dialog delivers.
#[derive(Debug, Clone)]
pub enum DialogScript {
    /// Deliver a redirect message carrying this token, echoing back the
    /// login URL's `state`.
    TokenMessage {
        /// The `access_token` to put in the message.
        access_token: String,
    },

    /// Deliver a fixed message.
    Message(String),

    /// The dialog fails to open.
    FailToOpen(String),

    /// The dialog opens but its message channel fails.
    Failure(String),
}

/// What the mock native auth channel does.
#[derive(Debug, Clone)]
pub enum NativeScript {
    /// Invoke the success callback with a redirect carrying this token,
    /// echoing back the login URL's `state`.
    TokenMessage {
        /// The `access_token` to put in the redirect.
        access_token: String,
    },

    /// Invoke the success callback with a fixed message.
    Message(String),

    /// Invoke the failure callback.
    Failure(String),
}

/// Scripted embedding host.
///
/// Defaults to a plain browser context (no dialog API) on a 1920×1080
/// screen at `https://app.example.com`, with every transport scripted to
/// complete successfully with a `mock_access_token`.
#[derive(Debug, Clone)]
pub struct MockHost {
    dialog_api: bool,
    screen: ScreenSize,
    origin: String,
    page_url: String,
    popup_script: PopupScript,
    dialog_script: DialogScript,
    native_script: NativeScript,
    popups_opened: Arc<AtomicUsize>,
    dialogs_opened: Arc<AtomicUsize>,
    native_requests: Arc<AtomicUsize>,
    forwarded: Arc<Mutex<Vec<String>>>,
    login_urls: Arc<Mutex<Vec<String>>>,
}

impl MockHost {
    /// Create a mock host with browser-like defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dialog_api: false,
            screen: ScreenSize {
                width: 1920,
                height: 1080,
            },
            origin: "https://app.example.com".to_string(),
            page_url: "https://app.example.com/".to_string(),
            popup_script: PopupScript::TokenRedirect {
                access_token: "mock_access_token".to_string(),
            },
            dialog_script: DialogScript::TokenMessage {
                access_token: "mock_access_token".to_string(),
            },
            native_script: NativeScript::TokenMessage {
                access_token: "mock_access_token".to_string(),
            },
            popups_opened: Arc::new(AtomicUsize::new(0)),
            dialogs_opened: Arc::new(AtomicUsize::new(0)),
            native_requests: Arc::new(AtomicUsize::new(0)),
            forwarded: Arc::new(Mutex::new(Vec::new())),
            login_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Toggle the rich host's dialog API.
    #[must_use]
    pub const fn with_dialog_api(mut self, available: bool) -> Self {
        self.dialog_api = available;
        self
    }

    /// Set the reported screen size.
    #[must_use]
    pub const fn with_screen(mut self, screen: ScreenSize) -> Self {
        self.screen = screen;
        self
    }

    /// Set the reported origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the current page URL.
    #[must_use]
    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    /// Script the popup transport.
    #[must_use]
    pub fn with_popup_script(mut self, script: PopupScript) -> Self {
        self.popup_script = script;
        self
    }

    /// Script the dialog transport.
    #[must_use]
    pub fn with_dialog_script(mut self, script: DialogScript) -> Self {
        self.dialog_script = script;
        self
    }

    /// Script the native auth channel.
    #[must_use]
    pub fn with_native_script(mut self, script: NativeScript) -> Self {
        self.native_script = script;
        self
    }

    /// How many popups were opened.
    #[must_use]
    pub fn popups_opened(&self) -> usize {
        self.popups_opened.load(Ordering::SeqCst)
    }

    /// How many dialogs were opened.
    #[must_use]
    pub fn dialogs_opened(&self) -> usize {
        self.dialogs_opened.load(Ordering::SeqCst)
    }

    /// How many native auth requests were made.
    #[must_use]
    pub fn native_requests(&self) -> usize {
        self.native_requests.load(Ordering::SeqCst)
    }

    /// URLs forwarded to the host by the terminal-redirect check.
    #[must_use]
    pub fn forwarded(&self) -> Vec<String> {
        self.forwarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Login URLs the transports were opened at.
    #[must_use]
    pub fn login_urls(&self) -> Vec<String> {
        self.login_urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record_login_url(&self, url: &str) {
        self.login_urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }

    /// Build a redirect URL landing on the login URL's `redirect_uri`,
    /// echoing its `state` back when one was generated.
    fn token_redirect(&self, login_url: &str, access_token: &str) -> String {
        let redirect =
            query_param(login_url, "redirect_uri").unwrap_or_else(|| self.origin.clone());
        let mut url = format!("{redirect}#access_token={access_token}");
        if let Some(state) = query_param(login_url, "state") {
            url.push_str(&format!("&state={state}"));
        }
        url
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthHost for MockHost {
    type Popup = MockPopup;
    type Dialog = MockDialog;

    fn supports_dialog(&self) -> bool {
        self.dialog_api
    }

    fn screen(&self) -> ScreenSize {
        self.screen
    }

    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn page_url(&self) -> String {
        self.page_url.clone()
    }

    fn open_popup(&self, url: &str, _size: &DialogSize) -> Result<MockPopup> {
        self.record_login_url(url);

        if matches!(self.popup_script, PopupScript::Blocked) {
            return Err(AuthError::PopupBlocked("popup blocked by host".to_string()));
        }
        self.popups_opened.fetch_add(1, Ordering::SeqCst);

        let frames = match &self.popup_script {
            PopupScript::TokenRedirect { access_token } => VecDeque::from(vec![
                PopupState::Foreign,
                PopupState::At(self.token_redirect(url, access_token)),
            ]),
            PopupScript::Navigate(target) => VecDeque::from(vec![
                PopupState::Foreign,
                PopupState::At(target.clone()),
            ]),
            PopupScript::ClosedByUser => VecDeque::from(vec![PopupState::Foreign]),
            PopupScript::Blocked => VecDeque::new(),
        };

        Ok(MockPopup {
            frames,
            closed: false,
        })
    }

    async fn open_dialog(&self, url: &str, _size: &DialogSize) -> Result<MockDialog> {
        self.record_login_url(url);

        let message = match &self.dialog_script {
            DialogScript::FailToOpen(reason) => {
                return Err(AuthError::DialogFailed(reason.clone()));
            }
            DialogScript::TokenMessage { access_token } => {
                Ok(self.token_redirect(url, access_token))
            }
            DialogScript::Message(message) => Ok(message.clone()),
            DialogScript::Failure(reason) => Err(AuthError::DialogFailed(reason.clone())),
        };
        self.dialogs_opened.fetch_add(1, Ordering::SeqCst);

        Ok(MockDialog {
            message: Some(message),
            closed: false,
        })
    }

    async fn request_native_auth(&self, url: &str, _size: &DialogSize) -> Result<String> {
        self.record_login_url(url);
        self.native_requests.fetch_add(1, Ordering::SeqCst);

        match &self.native_script {
            NativeScript::TokenMessage { access_token } => {
                Ok(self.token_redirect(url, access_token))
            }
            NativeScript::Message(message) => Ok(message.clone()),
            NativeScript::Failure(reason) => Err(AuthError::NativeChannelFailed(reason.clone())),
        }
    }

    fn forward_message(&self, url: &str) -> Result<()> {
        self.forwarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }
}

/// Popup handle replaying scripted frames, one per poll.
///
/// Once the frames run out (or the popup is closed) every further poll
/// reports [`PopupState::Closed`].
#[derive(Debug)]
pub struct MockPopup {
    frames: VecDeque<PopupState>,
    closed: bool,
}

impl HostPopup for MockPopup {
    fn poll(&mut self) -> PopupState {
        if self.closed {
            return PopupState::Closed;
        }
        self.frames.pop_front().unwrap_or(PopupState::Closed)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Dialog handle delivering its single scripted message.
#[derive(Debug)]
pub struct MockDialog {
    message: Option<Result<String>>,
    closed: bool,
}

impl MockDialog {
    /// Whether the dialog has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }
}

impl HostDialog for MockDialog {
    async fn await_message(&mut self) -> Result<String> {
        self.message
            .take()
            .unwrap_or_else(|| Err(AuthError::DialogFailed("no message scripted".to_string())))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Read a percent-decoded query parameter out of a URL.
fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == name {
                return Some(
                    urlencoding::decode(value).map_or_else(|_| value.to_string(), Into::into),
                );
            }
        }
    }
    None
}
