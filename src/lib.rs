//! Spatial aggregation, click hit-testing and region counting for incident maps.
//!
//! ```rust
//! use geotally::prelude::*;
//!
//! let mut engine = Engine::builder().build()?;
//!
//! let points = vec![
//!     Incident::new(1_700_000_000_000, 35.0844, -106.6504, "Burglary", "Property", "400 Gold Ave"),
//!     Incident::new(1_700_000_100_000, 35.0844, -106.6504, "Vandalism", "Property", "400 Gold Ave"),
//! ];
//! let viewport = Viewport::new(16.0, GeoBounds::new(-106.70, 35.05, -106.60, 35.12));
//! let projector = WebMercator::for_viewport(&viewport.bounds, viewport.zoom);
//!
//! let frame = engine.redraw(&points, &viewport, &projector, None);
//! assert_eq!(frame.groups()[0].total, 2);
//!
//! let regions = vec![RegionFeature::from_lon_lat(
//!     "87102",
//!     vec![vec![(-106.66, 35.07), (-106.66, 35.10), (-106.64, 35.10), (-106.64, 35.07)]],
//! )];
//! let source = || -> Result<Vec<RegionFeature>> { Ok(regions.clone()) };
//! engine.ensure_regions_loaded(&source)?;
//! let counts = engine.region_counts(&points, &FilterState::default())?;
//! assert_eq!(counts["87102"], 2);
//! # Ok::<(), geotally::TallyError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod engine;
pub mod error;
pub mod geokey;
pub mod projection;
pub mod state;
pub mod types;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::{Result, TallyError};

pub use config::{AggregationConfig, BinCellStep, Config, HitTestConfig, RegionConfig};

pub use geokey::{GeoBounds, GeoCellKey};

pub use projection::{Projector, WebMercator};

pub use types::{FilterState, Incident, RenderMode, ScreenPoint, TimeWindow, Viewport};

pub use compute::aggregate::{
    Aggregation, Breakdown, EventSample, LocationAggregator, LocationGroup, RenderPlan, Tier,
    TypeMeta,
};
pub use compute::hit_index::{Hit, HitIndex, visual_radius};
pub use compute::region::{
    RegionCounter, RegionCounts, RegionFeature, RegionSource, RegionStore, count_regions,
};
#[cfg(feature = "geojson")]
pub use compute::geojson::{GeoJsonSource, regions_from_geojson};

pub use state::{Epoch, EpochToken, FrameScheduler, RenderFrame};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Engine, EngineBuilder, Result, TallyError};

    pub use crate::{Config, FilterState, GeoBounds, Incident, RenderMode, ScreenPoint, Viewport};

    pub use crate::{Projector, WebMercator};

    pub use crate::{LocationGroup, RegionFeature, RegionSource, Tier};

    #[cfg(feature = "geojson")]
    pub use crate::GeoJsonSource;
}
