//! Core data types shared by the aggregation, hit-testing and region layers.
use crate::geokey::GeoBounds;
use serde::{Deserialize, Serialize};

/// A single normalized incident record.
///
/// Produced upstream by the filtering pipeline and borrowed by the engine for
/// the duration of one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Timestamp in milliseconds since the Unix epoch.
    pub ts: i64,
    pub lat: f64,
    pub lon: f64,
    /// Incident type (e.g. "Burglary").
    #[serde(rename = "type")]
    pub kind: String,
    /// Legend category the type belongs to.
    pub category: String,
    /// Block-level address.
    #[serde(default)]
    pub addr: String,
}

impl Incident {
    pub fn new(
        ts: i64,
        lat: f64,
        lon: f64,
        kind: impl Into<String>,
        category: impl Into<String>,
        addr: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            lat,
            lon,
            kind: kind.into(),
            category: category.into(),
            addr: addr.into(),
        }
    }
}

/// A pixel position in map-container coordinates (origin top-left, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another screen point.
    #[inline]
    pub fn distance_sq(&self, other: &ScreenPoint) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Grid cell over projected pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenCell {
    pub col: i64,
    pub row: i64,
}

impl ScreenCell {
    pub const fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }

    /// Cell containing `point` for a grid of `cell_px` pixels.
    #[inline]
    pub fn containing(point: &ScreenPoint, cell_px: f64) -> Self {
        Self {
            col: (point.x / cell_px).floor() as i64,
            row: (point.y / cell_px).floor() as i64,
        }
    }

    /// Neighboring cell. Saturates at the edge of the `i64` grid, where
    /// far-off finite points land.
    pub const fn offset(&self, dcol: i64, drow: i64) -> Self {
        Self {
            col: self.col.saturating_add(dcol),
            row: self.row.saturating_add(drow),
        }
    }
}

/// Current map viewport as reported by the map display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    /// Visible geographic bounds.
    pub bounds: GeoBounds,
}

impl Viewport {
    pub const fn new(zoom: f64, bounds: GeoBounds) -> Self {
        Self { zoom, bounds }
    }
}

/// What the dashboard is currently drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Incident markers and clusters.
    #[default]
    Incidents,
    /// Per-region choropleth.
    Regions,
}

/// Inclusive time window in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Every filter dimension that decides which incidents are in scope.
///
/// Serializes to a stable string and can be handed to
/// [`RegionCounter::count`](crate::compute::region::RegionCounter::count) as
/// the cache descriptor. Collections are ordered so that equal filter sets
/// always serialize identically.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub window: Option<TimeWindow>,
    /// Selected region ids; empty means all regions.
    pub regions: std::collections::BTreeSet<String>,
    /// Legend categories switched on; empty means all categories.
    pub categories: std::collections::BTreeSet<String>,
    /// Days of week (0 = Sunday) kept by the day filter.
    pub weekdays: std::collections::BTreeSet<u8>,
    /// Hours of day (0..24) kept by the hour filter.
    pub hours: std::collections::BTreeSet<u8>,
}

impl FilterState {
    pub fn with_window(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.window = Some(TimeWindow { start_ms, end_ms });
        self
    }

    pub fn with_region(mut self, id: impl Into<String>) -> Self {
        self.regions.insert(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_weekday(mut self, day: u8) -> Self {
        self.weekdays.insert(day);
        self
    }

    pub fn with_hour(mut self, hour: u8) -> Self {
        self.hours.insert(hour);
        self
    }
}
