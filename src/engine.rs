//! The engine facade: one struct owning all state a dashboard redraw needs.
//!
//! ```rust
//! use geotally::prelude::*;
//!
//! let mut engine = Engine::builder().build()?;
//!
//! let points = vec![
//!     Incident::new(0, 35.10, -106.60, "Burglary", "Property", "100 Central Ave"),
//!     Incident::new(0, 35.10, -106.60, "Burglary", "Property", "100 Central Ave"),
//! ];
//! let viewport = Viewport::new(15.0, GeoBounds::new(-106.7, 35.05, -106.5, 35.15));
//! let projector = WebMercator::for_viewport(&viewport.bounds, viewport.zoom);
//!
//! let frame = engine.redraw(&points, &viewport, &projector, None);
//! assert_eq!(frame.groups().len(), 1);
//!
//! let center = projector.project(35.10, -106.60);
//! assert_eq!(engine.hit_test(center).unwrap().total, 2);
//! # Ok::<(), geotally::TallyError>(())
//! ```

use crate::builder::EngineBuilder;
use crate::compute::aggregate::{LocationAggregator, LocationGroup};
use crate::compute::region::{RegionCounter, RegionCounts, RegionFeature, RegionSource, RegionStore};
use crate::config::Config;
use crate::error::Result;
use crate::projection::Projector;
use crate::state::{Epoch, EpochToken, RenderFrame};
use crate::types::{Incident, RenderMode, ScreenPoint, Viewport};
use serde::Serialize;
use std::sync::Arc;

/// Aggregation, hit-testing and region counting state for one map session.
///
/// Not thread-safe; redraws are expected to run on a single UI thread.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    aggregator: LocationAggregator,
    frame: Option<RenderFrame>,
    regions: RegionStore,
    counter: RegionCounter,
    visible_counts: Option<Arc<RegionCounts>>,
    epoch: Epoch,
    mode: RenderMode,
}

impl Engine {
    /// Create an engine from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: LocationAggregator::new(config.aggregation.clone()),
            counter: RegionCounter::new(config.regions.edge_epsilon),
            config,
            frame: None,
            regions: RegionStore::new(),
            visible_counts: None,
            epoch: Epoch::new(),
            mode: RenderMode::default(),
        })
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn aggregator(&self) -> &LocationAggregator {
        &self.aggregator
    }

    // ---- incidents ----

    /// Aggregate `points` for the viewport and replace the current frame.
    pub fn redraw<P>(
        &mut self,
        points: &[Incident],
        viewport: &Viewport,
        projector: &P,
        volume_hint: Option<usize>,
    ) -> &RenderFrame
    where
        P: Projector + ?Sized,
    {
        let aggregation = self
            .aggregator
            .aggregate(points, viewport, projector, volume_hint);
        self.frame
            .insert(RenderFrame::new(aggregation, projector, &self.config.hit_test))
    }

    /// The most recent frame, if anything has been drawn.
    pub fn frame(&self) -> Option<&RenderFrame> {
        self.frame.as_ref()
    }

    /// Re-project the current frame after the viewport moved without the
    /// incident set changing.
    pub fn viewport_changed<P>(&mut self, projector: &P)
    where
        P: Projector + ?Sized,
    {
        if let Some(frame) = self.frame.as_mut() {
            frame.reproject(projector, &self.config.hit_test);
        }
    }

    /// Group under a click, if any.
    pub fn hit_test(&self, point: ScreenPoint) -> Option<&LocationGroup> {
        self.frame.as_ref()?.hit(point)
    }

    /// Forget the current frame.
    pub fn clear_frame(&mut self) {
        self.frame = None;
    }

    // ---- regions ----

    /// Load regions once; later calls return the loaded set.
    pub fn ensure_regions_loaded<S>(&mut self, source: &S) -> Result<&[RegionFeature]>
    where
        S: RegionSource + ?Sized,
    {
        if !self.regions.is_loaded() {
            self.counter.invalidate();
        }
        self.regions.ensure_loaded(source)
    }

    pub fn regions(&self) -> Option<&[RegionFeature]> {
        self.regions.get()
    }

    /// Per-region counts for `points` under the filter `descriptor`.
    ///
    /// Empty until regions are loaded. See [`RegionCounter::count`].
    pub fn region_counts<D>(&mut self, points: &[Incident], descriptor: &D) -> Result<Arc<RegionCounts>>
    where
        D: Serialize + ?Sized,
    {
        self.counter.count(points, self.regions.get(), descriptor)
    }

    /// Force the next [`region_counts`](Self::region_counts) to recompute.
    ///
    /// Call this whenever the incident set changes while the filter
    /// descriptor does not.
    pub fn invalidate_region_counts(&mut self) {
        self.counter.invalidate();
    }

    pub fn region_counter(&self) -> &RegionCounter {
        &self.counter
    }

    /// Publish counts computed under `token`, unless the mode has changed
    /// since. Returns whether they were applied.
    pub fn apply_region_counts(&mut self, token: EpochToken, counts: Arc<RegionCounts>) -> bool {
        if self.epoch.is_current(token) {
            self.visible_counts = Some(counts);
            true
        } else {
            log::debug!("Dropping region counts computed for an earlier mode");
            false
        }
    }

    /// Counts currently shown on the choropleth.
    pub fn visible_counts(&self) -> Option<&RegionCounts> {
        self.visible_counts.as_deref()
    }

    // ---- mode ----

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Token for work that should only land if the mode stays the same.
    pub fn epoch_token(&self) -> EpochToken {
        self.epoch.token()
    }

    /// Switch render mode. Any in-flight result from the previous mode will
    /// be discarded when applied.
    pub fn switch_mode(&mut self, mode: RenderMode) -> EpochToken {
        if mode == self.mode {
            return self.epoch.token();
        }
        log::info!("Switching render mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
        self.visible_counts = None;
        self.epoch.advance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::aggregate::Tier;
    use crate::geokey::GeoBounds;
    use crate::types::FilterState;

    fn identity(lat: f64, lon: f64) -> ScreenPoint {
        ScreenPoint::new(lon, lat)
    }

    fn square(id: &str, x0: f64, y0: f64, size: f64) -> RegionFeature {
        RegionFeature::from_lon_lat(
            id,
            vec![vec![
                (x0, y0),
                (x0, y0 + size),
                (x0 + size, y0 + size),
                (x0 + size, y0),
            ]],
        )
    }

    fn at(lat: f64, lon: f64) -> Incident {
        Incident::new(0, lat, lon, "Theft", "Property", "")
    }

    #[test]
    fn test_redraw_replaces_frame() {
        let mut engine = Engine::new(Config::default()).unwrap();
        assert!(engine.frame().is_none());
        assert!(engine.hit_test(ScreenPoint::new(0.0, 0.0)).is_none());

        let viewport = Viewport::new(16.0, GeoBounds::new(0.0, 0.0, 100.0, 100.0));
        engine.redraw(&[at(10.0, 10.0)], &viewport, &identity, None);
        assert!(engine.hit_test(ScreenPoint::new(10.0, 10.0)).is_some());

        engine.redraw(&[at(50.0, 50.0)], &viewport, &identity, None);
        assert!(engine.hit_test(ScreenPoint::new(10.0, 10.0)).is_none());
        assert!(engine.hit_test(ScreenPoint::new(50.0, 50.0)).is_some());
        assert_eq!(
            engine.frame().unwrap().aggregation().plan.tier,
            Tier::Clustered
        );

        engine.clear_frame();
        assert!(engine.frame().is_none());
    }

    #[test]
    fn test_viewport_change_reprojects() {
        let mut engine = Engine::new(Config::default()).unwrap();
        let viewport = Viewport::new(16.0, GeoBounds::new(0.0, 0.0, 100.0, 100.0));
        engine.redraw(&[at(10.0, 10.0)], &viewport, &identity, None);

        let shifted = |lat: f64, lon: f64| ScreenPoint::new(lon + 200.0, lat);
        engine.viewport_changed(&shifted);
        assert!(engine.hit_test(ScreenPoint::new(10.0, 10.0)).is_none());
        assert!(engine.hit_test(ScreenPoint::new(210.0, 10.0)).is_some());
    }

    #[test]
    fn test_region_counts_wait_for_regions() {
        let mut engine = Engine::new(Config::default()).unwrap();
        let filters = FilterState::default();
        let points = vec![at(5.0, 5.0)];

        assert!(engine.region_counts(&points, &filters).unwrap().is_empty());

        let source = || -> Result<Vec<RegionFeature>> { Ok(vec![square("a", 0.0, 0.0, 10.0)]) };
        engine.ensure_regions_loaded(&source).unwrap();
        assert_eq!(engine.region_counts(&points, &filters).unwrap()["a"], 1);
        assert_eq!(engine.region_counter().recomputations(), 1);
    }

    #[test]
    fn test_invalidate_after_new_page() {
        let mut engine = Engine::new(Config::default()).unwrap();
        let source = || -> Result<Vec<RegionFeature>> { Ok(vec![square("a", 0.0, 0.0, 10.0)]) };
        engine.ensure_regions_loaded(&source).unwrap();

        let filters = FilterState::default().with_category("Property");
        let mut points = vec![at(5.0, 5.0)];
        assert_eq!(engine.region_counts(&points, &filters).unwrap()["a"], 1);

        points.push(at(6.0, 6.0));
        engine.invalidate_region_counts();
        assert_eq!(engine.region_counts(&points, &filters).unwrap()["a"], 2);
    }

    #[test]
    fn test_stale_counts_not_applied_after_mode_switch() {
        let mut engine = Engine::new(Config::default()).unwrap();
        let source = || -> Result<Vec<RegionFeature>> { Ok(vec![square("a", 0.0, 0.0, 10.0)]) };
        engine.ensure_regions_loaded(&source).unwrap();

        let token = engine.switch_mode(RenderMode::Regions);
        assert_eq!(engine.mode(), RenderMode::Regions);
        let counts = engine.region_counts(&[at(5.0, 5.0)], "filters").unwrap();

        engine.switch_mode(RenderMode::Incidents);
        assert!(!engine.apply_region_counts(token, Arc::clone(&counts)));
        assert!(engine.visible_counts().is_none());

        let token = engine.switch_mode(RenderMode::Regions);
        assert!(engine.apply_region_counts(token, counts));
        assert_eq!(engine.visible_counts().unwrap()["a"], 1);

        // same mode again keeps the epoch
        let same = engine.switch_mode(RenderMode::Regions);
        assert_eq!(same, token);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.hit_test.cell_px = 1.0;
        assert!(Engine::new(config).is_err());
    }
}
