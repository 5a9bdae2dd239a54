//! Engine configuration.
//!
//! Every threshold the aggregation, hit-testing and region layers rely on
//! lives here so that dashboards can tune level-of-detail policy without
//! touching code. All fields have serde defaults; an empty JSON object is a
//! valid configuration.
//!
//! ```rust
//! use geotally::Config;
//!
//! let config = Config::from_json(r#"{
//!     "aggregation": { "max_events_per_group": 50 },
//!     "hit_test": { "hit_padding": 6.0 }
//! }"#).unwrap();
//! assert_eq!(config.aggregation.max_events_per_group, 50);
//! assert_eq!(config.aggregation.key_precision, 6);
//! ```
use crate::compute::hit_index::MAX_VISUAL_RADIUS;
use crate::error::{Result, TallyError};
use crate::geokey::{DEFAULT_KEY_PRECISION, MAX_KEY_PRECISION};
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub hit_test: HitTestConfig,

    #[serde(default)]
    pub regions: RegionConfig,
}

/// Pixel-bin cell size used below a given zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinCellStep {
    pub below_zoom: f64,
    pub cell_px: f64,
}

/// Level-of-detail policy for [`LocationAggregator`](crate::compute::aggregate::LocationAggregator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Decimal places used for same-location keys.
    #[serde(default = "AggregationConfig::default_key_precision")]
    pub key_precision: u8,

    /// Event samples kept per location group.
    #[serde(default = "AggregationConfig::default_max_events_per_group")]
    pub max_events_per_group: usize,

    /// Below this zoom, large volumes skip clustering entirely.
    #[serde(default = "AggregationConfig::default_points_only_max_zoom")]
    pub points_only_max_zoom: f64,

    /// Volume at or above which the points-only tier applies; at or below it
    /// rich icons are always allowed.
    #[serde(default = "AggregationConfig::default_small_volume")]
    pub small_volume: usize,

    /// Location group count above which groups are re-binned by pixel cell.
    #[serde(default = "AggregationConfig::default_max_groups")]
    pub max_groups: usize,

    /// Event samples kept per pixel bin.
    #[serde(default = "AggregationConfig::default_max_bin_events")]
    pub max_bin_events: usize,

    /// Zoom at or above which single incidents may use a rich icon.
    #[serde(default = "AggregationConfig::default_icon_min_zoom")]
    pub icon_min_zoom: f64,

    /// Rich icons are disabled once there are this many groups.
    #[serde(default = "AggregationConfig::default_icon_max_groups")]
    pub icon_max_groups: usize,

    /// Pixel-bin sizes, ordered by ascending `below_zoom`.
    #[serde(default = "AggregationConfig::default_bin_cell_steps")]
    pub bin_cell_steps: Vec<BinCellStep>,

    /// Pixel-bin size once the zoom is past every step.
    #[serde(default = "AggregationConfig::default_fine_bin_cell_px")]
    pub fine_bin_cell_px: f64,
}

impl AggregationConfig {
    const fn default_key_precision() -> u8 {
        DEFAULT_KEY_PRECISION
    }

    const fn default_max_events_per_group() -> usize {
        120
    }

    const fn default_points_only_max_zoom() -> f64 {
        13.0
    }

    const fn default_small_volume() -> usize {
        2_000
    }

    const fn default_max_groups() -> usize {
        200_000
    }

    const fn default_max_bin_events() -> usize {
        30
    }

    const fn default_icon_min_zoom() -> f64 {
        15.0
    }

    const fn default_icon_max_groups() -> usize {
        4_000
    }

    fn default_bin_cell_steps() -> Vec<BinCellStep> {
        vec![
            BinCellStep {
                below_zoom: 11.0,
                cell_px: 48.0,
            },
            BinCellStep {
                below_zoom: 13.0,
                cell_px: 32.0,
            },
            BinCellStep {
                below_zoom: 15.0,
                cell_px: 24.0,
            },
        ]
    }

    const fn default_fine_bin_cell_px() -> f64 {
        16.0
    }

    /// Pixel-bin cell size for a zoom level; coarser at lower zoom.
    pub fn bin_cell_px(&self, zoom: f64) -> f64 {
        self.bin_cell_steps
            .iter()
            .find(|step| zoom < step.below_zoom)
            .map(|step| step.cell_px)
            .unwrap_or(self.fine_bin_cell_px)
    }

    pub fn with_key_precision(mut self, precision: u8) -> Self {
        self.key_precision = precision;
        self
    }

    pub fn with_max_events_per_group(mut self, max: usize) -> Self {
        self.max_events_per_group = max;
        self
    }

    pub fn with_points_only(mut self, max_zoom: f64, small_volume: usize) -> Self {
        self.points_only_max_zoom = max_zoom;
        self.small_volume = small_volume;
        self
    }

    pub fn with_max_groups(mut self, max_groups: usize) -> Self {
        self.max_groups = max_groups;
        self
    }

    pub fn with_max_bin_events(mut self, max: usize) -> Self {
        self.max_bin_events = max;
        self
    }

    pub fn with_icon_policy(mut self, min_zoom: f64, max_groups: usize) -> Self {
        self.icon_min_zoom = min_zoom;
        self.icon_max_groups = max_groups;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.key_precision > MAX_KEY_PRECISION {
            return Err(TallyError::InvalidConfig(format!(
                "Key precision must be at most {}, got {}",
                MAX_KEY_PRECISION, self.key_precision
            )));
        }

        if self.max_groups == 0 {
            return Err(TallyError::InvalidConfig(
                "Group cap must be greater than zero".to_string(),
            ));
        }

        if !self.points_only_max_zoom.is_finite() || !self.icon_min_zoom.is_finite() {
            return Err(TallyError::InvalidConfig(
                "Zoom thresholds must be finite".to_string(),
            ));
        }

        let mut previous_zoom = f64::NEG_INFINITY;
        for step in &self.bin_cell_steps {
            if !(step.cell_px.is_finite() && step.cell_px > 0.0) {
                return Err(TallyError::InvalidConfig(format!(
                    "Bin cell size must be positive, got {}",
                    step.cell_px
                )));
            }
            if step.below_zoom <= previous_zoom {
                return Err(TallyError::InvalidConfig(
                    "Bin cell steps must be ordered by ascending zoom".to_string(),
                ));
            }
            previous_zoom = step.below_zoom;
        }

        if !(self.fine_bin_cell_px.is_finite() && self.fine_bin_cell_px > 0.0) {
            return Err(TallyError::InvalidConfig(format!(
                "Bin cell size must be positive, got {}",
                self.fine_bin_cell_px
            )));
        }

        Ok(())
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            key_precision: Self::default_key_precision(),
            max_events_per_group: Self::default_max_events_per_group(),
            points_only_max_zoom: Self::default_points_only_max_zoom(),
            small_volume: Self::default_small_volume(),
            max_groups: Self::default_max_groups(),
            max_bin_events: Self::default_max_bin_events(),
            icon_min_zoom: Self::default_icon_min_zoom(),
            icon_max_groups: Self::default_icon_max_groups(),
            bin_cell_steps: Self::default_bin_cell_steps(),
            fine_bin_cell_px: Self::default_fine_bin_cell_px(),
        }
    }
}

/// Screen grid and tolerance for click hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HitTestConfig {
    /// Side of a screen grid cell in pixels.
    #[serde(default = "HitTestConfig::default_cell_px")]
    pub cell_px: f64,

    /// Extra pixels added to a marker's radius when testing clicks.
    #[serde(default = "HitTestConfig::default_hit_padding")]
    pub hit_padding: f64,
}

impl HitTestConfig {
    const fn default_cell_px() -> f64 {
        64.0
    }

    const fn default_hit_padding() -> f64 {
        4.0
    }

    pub fn with_hit_padding(mut self, padding: f64) -> Self {
        self.hit_padding = padding;
        self
    }

    pub fn with_cell_px(mut self, cell_px: f64) -> Self {
        self.cell_px = cell_px;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.hit_padding.is_finite() && self.hit_padding >= 0.0) {
            return Err(TallyError::InvalidConfig(format!(
                "Hit padding must be non-negative, got {}",
                self.hit_padding
            )));
        }

        // A 3x3 neighborhood only sees every reachable marker when a cell is
        // at least as wide as the largest hit radius.
        let reach = MAX_VISUAL_RADIUS + self.hit_padding;
        if !(self.cell_px.is_finite() && self.cell_px >= reach) {
            return Err(TallyError::InvalidConfig(format!(
                "Hit cell size must be at least {} px, got {}",
                reach, self.cell_px
            )));
        }

        Ok(())
    }
}

impl Default for HitTestConfig {
    fn default() -> Self {
        Self {
            cell_px: Self::default_cell_px(),
            hit_padding: Self::default_hit_padding(),
        }
    }
}

/// Region loading and point-in-polygon settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionConfig {
    /// Feature property holding the region id in GeoJSON sources.
    #[serde(default = "RegionConfig::default_id_property")]
    pub id_property: String,

    /// Stand-in for a zero vertical span in the ray-casting test.
    #[serde(default = "RegionConfig::default_edge_epsilon")]
    pub edge_epsilon: f64,
}

impl RegionConfig {
    fn default_id_property() -> String {
        "zip".to_string()
    }

    const fn default_edge_epsilon() -> f64 {
        1e-12
    }

    pub fn with_id_property(mut self, property: impl Into<String>) -> Self {
        self.id_property = property.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.edge_epsilon.is_finite() && self.edge_epsilon > 0.0) {
            return Err(TallyError::InvalidConfig(format!(
                "Edge epsilon must be positive, got {}",
                self.edge_epsilon
            )));
        }
        if self.id_property.is_empty() {
            return Err(TallyError::InvalidConfig(
                "Region id property must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            id_property: Self::default_id_property(),
            edge_epsilon: Self::default_edge_epsilon(),
        }
    }
}

impl Config {
    pub fn with_aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_hit_test(mut self, hit_test: HitTestConfig) -> Self {
        self.hit_test = hit_test;
        self
    }

    pub fn with_regions(mut self, regions: RegionConfig) -> Self {
        self.regions = regions;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.aggregation.validate()?;
        self.hit_test.validate()?;
        self.regions.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| TallyError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| TallyError::InvalidConfig(format!("Failed to write TOML: {}", e)))
    }
}
