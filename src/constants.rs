//! Authentication constants.
//!
//! This module contains constant values used throughout the authentication flow.

use std::time::Duration;

/// Interval at which the popup transport polls the popup's location.
pub const POPUP_POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Storage namespaces for the keyed stores.
pub mod namespaces {
    /// Namespace for registered endpoint configurations.
    pub const ENDPOINTS: &str = "OAuth2Endpoints";

    /// Namespace for cached tokens.
    pub const TOKENS: &str = "OAuth2Tokens";
}

/// Dialog and popup geometry.
pub mod geometry {
    /// Default dialog width in pixels.
    pub const DEFAULT_WIDTH: u32 = 1024;

    /// Default dialog height in pixels.
    pub const DEFAULT_HEIGHT: u32 = 768;

    /// Dialog width on small screens.
    pub const COMPACT_WIDTH: u32 = 640;

    /// Dialog height on small screens.
    pub const COMPACT_HEIGHT: u32 = 480;

    /// Screens at or below this width get the compact dialog.
    pub const SMALL_SCREEN_WIDTH: u32 = 640;

    /// Margin kept free when a dialog is clamped to the screen.
    pub const EDGE_MARGIN: u32 = 30;
}
