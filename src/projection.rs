//! Geographic to container-pixel projection.
//!
//! The engine never draws, but pixel binning and hit-testing both need to
//! know where a coordinate lands on screen. Callers supply a [`Projector`];
//! [`WebMercator`] covers the usual slippy-map case.

use crate::geokey::GeoBounds;
use crate::types::ScreenPoint;
use std::f64::consts::PI;

/// Pixel size of one map tile.
pub const TILE_SIZE: f64 = 256.0;

/// Maps `(lat, lon)` to container pixel coordinates for the current viewport.
pub trait Projector {
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint;
}

impl<F> Projector for F
where
    F: Fn(f64, f64) -> ScreenPoint,
{
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint {
        self(lat, lon)
    }
}

/// Longitude to spherical mercator in the [0..1] range.
fn lng_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitude to spherical mercator in the [0..1] range, clamped at the poles.
fn lat_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - (0.25 * ((1.0 + sin) / (1.0 - sin)).ln()) / PI;
    y.clamp(0.0, 1.0)
}

/// Spherical web mercator projection relative to a viewport's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    world_size: f64,
    origin: ScreenPoint,
}

impl WebMercator {
    /// Projection whose pixel origin is the north-west corner of `bounds`.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotally::geokey::GeoBounds;
    /// use geotally::projection::{Projector, WebMercator};
    ///
    /// let bounds = GeoBounds::new(-106.8, 35.0, -106.4, 35.2);
    /// let proj = WebMercator::for_viewport(&bounds, 12.0);
    /// let nw = proj.project(35.2, -106.8);
    /// assert!(nw.x.abs() < 1e-6 && nw.y.abs() < 1e-6);
    ///
    /// let se = proj.project(35.0, -106.4);
    /// assert!(se.x > 0.0 && se.y > 0.0);
    /// ```
    pub fn for_viewport(bounds: &GeoBounds, zoom: f64) -> Self {
        let world_size = TILE_SIZE * 2f64.powf(zoom);
        Self {
            world_size,
            origin: ScreenPoint::new(
                lng_x(bounds.west) * world_size,
                lat_y(bounds.north) * world_size,
            ),
        }
    }

    /// Width of the whole world in pixels at this zoom.
    pub fn world_size(&self) -> f64 {
        self.world_size
    }
}

impl Projector for WebMercator {
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint {
        ScreenPoint::new(
            lng_x(lon) * self.world_size - self.origin.x,
            lat_y(lat) * self.world_size - self.origin.y,
        )
    }
}
