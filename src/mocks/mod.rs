//! Mock implementations for testing.
//!
//! A scripted [`MockHost`] stands in for the embedding environment so the
//! whole authentication state machine runs at memory speed, including the
//! popup polling loop and the dialog message channel.

mod host;

pub use host::{DialogScript, MockDialog, MockHost, MockPopup, NativeScript, PopupScript};
