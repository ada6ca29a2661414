//! Dialog and popup sizing.
//!
//! All three transports share one sizing rule: target 1024×768 (640×480 on
//! small screens), clamped to the available screen minus a margin. The
//! result is expressed both in raw pixels (for APIs that size in pixels,
//! such as popups and the native channel) and as a percentage of the
//! screen (for the rich-host dialog API).

use crate::constants::geometry;
use serde::{Deserialize, Serialize};

/// Screen dimensions reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    /// Screen width in pixels.
    pub width: u32,

    /// Screen height in pixels.
    pub height: u32,
}

/// Computed dialog dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogSize {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Width as a percentage of the screen width.
    pub width_percent: f64,

    /// Height as a percentage of the screen height.
    pub height_percent: f64,
}

impl DialogSize {
    /// Compute the dialog size for a given screen.
    ///
    /// Screens at or below 640 px wide target 640×480, everything else
    /// targets 1024×768. Each axis that exceeds the screen is clamped to
    /// the screen dimension minus a 30 px margin.
    #[must_use]
    pub fn for_screen(screen: ScreenSize) -> Self {
        let (target_width, target_height) = if screen.width <= geometry::SMALL_SCREEN_WIDTH {
            (geometry::COMPACT_WIDTH, geometry::COMPACT_HEIGHT)
        } else {
            (geometry::DEFAULT_WIDTH, geometry::DEFAULT_HEIGHT)
        };

        let width = clamp_axis(target_width, screen.width);
        let height = clamp_axis(target_height, screen.height);

        Self {
            width,
            height,
            width_percent: percent_of(width, screen.width),
            height_percent: percent_of(height, screen.height),
        }
    }
}

const fn clamp_axis(target: u32, available: u32) -> u32 {
    if target > available {
        available.saturating_sub(geometry::EDGE_MARGIN)
    } else {
        target
    }
}

fn percent_of(value: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(value) * 100.0 / f64::from(whole)
    }
}
