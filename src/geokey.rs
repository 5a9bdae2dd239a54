//! Stable location keys and bounding boxes.
//!
//! Everything here is a pure function of its inputs: the same coordinates at
//! the same precision always produce the same key, regardless of call order.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Default number of decimal places used for "same location" keys.
pub const DEFAULT_KEY_PRECISION: u8 = 6;

/// Largest precision accepted for location keys.
///
/// Beyond this the scaled coordinate no longer fits comfortably in an `i64`
/// mantissa and rounding stops being meaningful for `f64` inputs.
pub const MAX_KEY_PRECISION: u8 = 12;

/// Round `value` to `precision` decimal places.
///
/// # Examples
///
/// ```
/// use geotally::geokey::round_to;
///
/// assert_eq!(round_to(35.1234567, 6), 35.123457);
/// assert_eq!(round_to(-106.5, 0), -107.0);
/// ```
pub fn round_to(value: f64, precision: u8) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

/// Key identifying a "same location" bucket.
///
/// Coordinates are scaled by `10^precision` and rounded to integers, so the
/// key hashes and compares exactly, unlike the rounded floats themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeoCellKey {
    lat: i64,
    lon: i64,
}

impl GeoCellKey {
    /// Build the key for a coordinate at the given precision.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotally::geokey::GeoCellKey;
    ///
    /// let a = GeoCellKey::new(35.1000001, -106.6000004, 6);
    /// let b = GeoCellKey::new(35.1, -106.6, 6);
    /// assert_eq!(a, b);
    /// assert_ne!(a, GeoCellKey::new(35.100002, -106.6, 6));
    /// ```
    pub fn new(lat: f64, lon: f64, precision: u8) -> Self {
        let scale = 10f64.powi(precision as i32);
        Self {
            lat: (lat * scale).round() as i64,
            lon: (lon * scale).round() as i64,
        }
    }

    /// Rounded latitude/longitude this key represents.
    pub fn to_degrees(self, precision: u8) -> (f64, f64) {
        let scale = 10f64.powi(precision as i32);
        (self.lat as f64 / scale, self.lon as f64 / scale)
    }
}

/// Axis-aligned geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl GeoBounds {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Smallest box covering every coordinate of a ring (`x` = lon, `y` = lat).
    ///
    /// Returns `None` for an empty ring.
    pub fn from_coords(coords: &[Coord]) -> Option<Self> {
        let first = coords.first()?;
        let mut bounds = Self::new(first.x, first.y, first.x, first.y);
        for c in &coords[1..] {
            bounds.west = bounds.west.min(c.x);
            bounds.east = bounds.east.max(c.x);
            bounds.south = bounds.south.min(c.y);
            bounds.north = bounds.north.max(c.y);
        }
        Some(bounds)
    }

    /// Inclusive containment test.
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        !(self.east < other.west
            || self.west > other.east
            || self.north < other.south
            || self.south > other.north)
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

impl From<Rect> for GeoBounds {
    fn from(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

impl From<GeoBounds> for Rect {
    fn from(bounds: GeoBounds) -> Self {
        Rect::new(
            geo::coord! { x: bounds.west, y: bounds.south },
            geo::coord! { x: bounds.east, y: bounds.north },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_pure() {
        let coords = [(35.1, -106.6), (35.2, -106.7), (35.1000004, -106.6000001)];

        let forward: Vec<_> = coords
            .iter()
            .map(|(lat, lon)| GeoCellKey::new(*lat, *lon, 6))
            .collect();
        let backward: Vec<_> = coords
            .iter()
            .rev()
            .map(|(lat, lon)| GeoCellKey::new(*lat, *lon, 6))
            .collect();

        assert_eq!(forward[0], backward[2]);
        assert_eq!(forward[1], backward[1]);
        assert_eq!(forward[2], backward[0]);
        assert_eq!(forward[0], forward[2]);
    }

    #[test]
    fn test_key_precision() {
        let a = GeoCellKey::new(35.123, -106.456, 2);
        let b = GeoCellKey::new(35.118, -106.461, 2);
        assert_eq!(a, b);

        let c = GeoCellKey::new(35.123, -106.456, 3);
        let d = GeoCellKey::new(35.118, -106.461, 3);
        assert_ne!(c, d);

        assert_eq!(a.to_degrees(2), (35.12, -106.46));
    }

    #[test]
    fn test_bounds_from_coords() {
        let ring = vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 0.0, y: 10.0 },
            Coord { x: 10.0, y: 10.0 },
            Coord { x: 10.0, y: 0.0 },
        ];
        let bounds = GeoBounds::from_coords(&ring).unwrap();
        assert_eq!(bounds, GeoBounds::new(0.0, 0.0, 10.0, 10.0));
        assert!(bounds.contains(5.0, 5.0));
        assert!(bounds.contains(10.0, 0.0));
        assert!(!bounds.contains(15.0, 15.0));

        assert!(GeoBounds::from_coords(&[]).is_none());
    }

    #[test]
    fn test_bounds_intersect_and_rect_roundtrip() {
        let a = GeoBounds::new(-107.0, 35.0, -106.0, 36.0);
        let b = GeoBounds::new(-106.5, 35.5, -105.0, 37.0);
        let c = GeoBounds::new(-100.0, 30.0, -99.0, 31.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let rect: Rect = a.into();
        assert_eq!(GeoBounds::from(rect), a);
        assert_eq!(a.width(), 1.0);
        assert_eq!(a.height(), 1.0);
    }
}
