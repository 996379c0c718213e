//! Caret-relative overlay placement

use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;
use crate::surface::{HostElement, Rect, SurfaceKind};

/// Gap between the element's top edge and an overlay placed above it
const ABOVE_GAP: f64 = 10.0;

/// Horizontal caret offset used for plain controls, which expose no caret geometry
const PLAIN_CARET_INSET: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    /// `y` is the overlay's top edge
    Below,
    /// `y` is the overlay's bottom edge
    Above,
}

/// Overlay position in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPosition {
    pub left: f64,
    pub y: f64,
    pub placement: Placement,
    pub max_height: f64,
}

/// Client-space point the overlay hangs from: (left, bottom)
pub fn caret_anchor(element: &dyn HostElement, surface: SurfaceKind) -> (f64, f64) {
    let rect = element.bounding_rect();
    match surface {
        SurfaceKind::RichText => element
            .caret_rect()
            .map(|caret| (caret.left, caret.bottom()))
            .unwrap_or((rect.left, rect.bottom())),
        SurfaceKind::PlainText => (rect.left + PLAIN_CARET_INSET, rect.bottom()),
        SurfaceKind::Unsupported => (rect.left, rect.bottom()),
    }
}

/// Place the overlay below the caret, or above the element when the space
/// below is too short for its max height.
pub fn compute_position(
    anchor: (f64, f64),
    element_rect: Rect,
    viewport: Viewport,
    config: &OverlayConfig,
) -> OverlayPosition {
    let (mut left, caret_bottom) = anchor;

    if left + config.width > viewport.width - config.margin {
        left = (viewport.width - config.width - config.margin).max(config.margin);
    }

    let (y, placement) = if caret_bottom + config.max_height > viewport.height - config.margin {
        (element_rect.top - ABOVE_GAP, Placement::Above)
    } else {
        (caret_bottom, Placement::Below)
    };

    OverlayPosition {
        left: left + viewport.scroll_x,
        y: y + viewport.scroll_y,
        placement,
        max_height: config.max_height,
    }
}
