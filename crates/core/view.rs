//! Per-frame view description passed in by the renderer.

use mapcluster_types::bounds::{MapBounds, MapPos};
use mapcluster_types::frustum::Frustum;

/// Snapshot of the camera for one frame. All positions are internal
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Visible volume.
    pub frustum: Frustum,
    pub zoom: f32,
    /// Internal-coordinate length covered by one screen pixel at the focus.
    pub pixel_measure: f64,
    /// Point the camera looks at.
    pub focus: MapPos,
}

impl ViewState {
    pub fn new(frustum: Frustum, zoom: f32, pixel_measure: f64, focus: MapPos) -> Self {
        Self {
            frustum,
            zoom,
            pixel_measure,
            focus,
        }
    }

    /// Top-down orthographic view showing `bounds` across `screen_width_px`
    /// pixels.
    ///
    /// # Examples
    ///
    /// ```
    /// use mapcluster::view::ViewState;
    /// use mapcluster_types::bounds::{MapBounds, MapPos};
    ///
    /// let bounds = MapBounds::new(MapPos::new(0.0, 0.0), MapPos::new(1000.0, 500.0));
    /// let view = ViewState::for_bounds(&bounds, 500.0, 12.0);
    /// assert_eq!(view.pixel_measure, 2.0);
    /// assert_eq!(view.focus, MapPos::new(500.0, 250.0));
    /// ```
    pub fn for_bounds(bounds: &MapBounds, screen_width_px: f64, zoom: f32) -> Self {
        let pixel_measure = if screen_width_px > 0.0 {
            bounds.delta().x / screen_width_px
        } else {
            log::warn!("Ignoring non-positive screen width {screen_width_px}");
            0.0
        };
        Self {
            frustum: Frustum::from_bounds(bounds),
            zoom,
            pixel_measure,
            focus: bounds.center(),
        }
    }
}
