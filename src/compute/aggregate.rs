//! Location grouping with adaptive level of detail.
//!
//! A pass turns a filtered incident slice into [`LocationGroup`]s using one
//! of three tiers:
//!
//! - [`Tier::PointsOnly`]: far zoom with a large volume, one record per
//!   incident and no clustering work at all.
//! - [`Tier::Clustered`]: incidents sharing a [`GeoCellKey`] are merged.
//! - [`Tier::PixelBinned`]: too many clustered groups, so they are re-binned
//!   by projected pixel cell.
//!
//! Whatever the tier, the sum of `total` over the returned groups equals the
//! number of incidents that took part (see [`Aggregation::total_count`]).

use super::binning::bin_by_pixel;
use crate::config::AggregationConfig;
use crate::geokey::GeoCellKey;
use crate::projection::Projector;
use crate::types::{Incident, ScreenPoint, Viewport};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Count and legend category of one incident type inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMeta {
    pub count: usize,
    pub category: String,
}

/// Per-type breakdown of a group, ordered by type name.
pub type Breakdown = BTreeMap<String, TypeMeta>;

/// Sampled incident shown in a group's popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSample {
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub addr: String,
}

impl From<&Incident> for EventSample {
    fn from(incident: &Incident) -> Self {
        Self {
            ts: incident.ts,
            kind: incident.kind.clone(),
            addr: incident.addr.clone(),
        }
    }
}

/// An aggregated cluster of incidents sharing a location key or pixel bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationGroup {
    /// Latitude of the first incident seen for this group.
    pub lat: f64,
    /// Longitude of the first incident seen for this group.
    pub lon: f64,
    /// Pre-projected container position, set for pixel-binned groups so the
    /// renderer can skip re-projection.
    pub screen: Option<ScreenPoint>,
    /// True incident count, including incidents whose events were dropped.
    pub total: usize,
    pub breakdown: Breakdown,
    /// Capped, insertion-ordered event sample.
    pub events: Vec<EventSample>,
}

impl LocationGroup {
    /// Minimal single-incident record used by the points-only tier.
    pub fn single(incident: &Incident) -> Self {
        let mut breakdown = Breakdown::new();
        breakdown.insert(
            incident.kind.clone(),
            TypeMeta {
                count: 1,
                category: incident.category.clone(),
            },
        );
        Self {
            lat: incident.lat,
            lon: incident.lon,
            screen: None,
            total: 1,
            breakdown,
            events: Vec::new(),
        }
    }

    fn seeded(incident: &Incident) -> Self {
        Self {
            lat: incident.lat,
            lon: incident.lon,
            screen: None,
            total: 0,
            breakdown: Breakdown::new(),
            events: Vec::new(),
        }
    }

    /// Count one incident into this group, sampling its event while the
    /// sample is under `max_events`.
    pub fn record(&mut self, incident: &Incident, max_events: usize) {
        self.total += 1;
        match self.breakdown.get_mut(&incident.kind) {
            Some(meta) => meta.count += 1,
            None => {
                self.breakdown.insert(
                    incident.kind.clone(),
                    TypeMeta {
                        count: 1,
                        category: incident.category.clone(),
                    },
                );
            }
        }
        if self.events.len() < max_events {
            self.events.push(EventSample::from(incident));
        }
    }

    /// Fold another group into this one. Position stays with `self`.
    pub fn absorb(&mut self, other: LocationGroup, max_events: usize) {
        self.total += other.total;
        for (kind, meta) in other.breakdown {
            self.breakdown
                .entry(kind)
                .and_modify(|existing| existing.count += meta.count)
                .or_insert(meta);
        }
        let room = max_events.saturating_sub(self.events.len());
        self.events.extend(other.events.into_iter().take(room));
    }

    /// Whether the renderer can use `screen` directly.
    pub fn is_pre_projected(&self) -> bool {
        self.screen.is_some()
    }

    /// Legend category of the most frequent type (first by name on ties).
    pub fn dominant_category(&self) -> Option<&str> {
        let mut best: Option<&TypeMeta> = None;
        for meta in self.breakdown.values() {
            if best.is_none_or(|b| meta.count > b.count) {
                best = Some(meta);
            }
        }
        best.map(|meta| meta.category.as_str())
    }
}

/// Aggregation strategy chosen for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    PointsOnly,
    Clustered,
    PixelBinned,
}

/// Advisory metadata handed to the renderer alongside the groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderPlan {
    pub tier: Tier,
    /// Single-incident groups may be drawn with a rich glyph instead of a dot.
    pub icons_eligible: bool,
    /// Group positions are already in container pixels.
    pub pre_projected: bool,
    /// Volume the tier decision was based on.
    pub volume: usize,
    /// Incidents skipped because of non-finite coordinates.
    pub skipped: usize,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub plan: RenderPlan,
    pub groups: Vec<LocationGroup>,
}

impl Aggregation {
    /// Sum of `total` across all groups.
    pub fn total_count(&self) -> usize {
        self.groups.iter().map(|g| g.total).sum()
    }
}

/// Groups incidents for drawing according to an [`AggregationConfig`].
#[derive(Debug, Clone, Default)]
pub struct LocationAggregator {
    config: AggregationConfig,
}

impl LocationAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Pick the tier for a viewport and volume, before any grouping.
    pub fn initial_tier(&self, zoom: f64, volume: usize) -> Tier {
        if zoom < self.config.points_only_max_zoom && volume >= self.config.small_volume {
            Tier::PointsOnly
        } else {
            Tier::Clustered
        }
    }

    /// Whether single-incident groups may use rich glyphs.
    pub fn icons_eligible(&self, zoom: f64, volume: usize, group_count: usize) -> bool {
        (zoom >= self.config.icon_min_zoom || volume <= self.config.small_volume)
            && group_count < self.config.icon_max_groups
    }

    /// Run one aggregation pass.
    ///
    /// `volume_hint` overrides `points.len()` as the volume used for tier and
    /// icon decisions, e.g. the number of incidents in view rather than in
    /// the whole filtered set.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotally::{GeoBounds, Incident, LocationAggregator, Tier, Viewport, WebMercator};
    ///
    /// let points = vec![
    ///     Incident::new(0, 35.10, -106.60, "A", "Property", ""),
    ///     Incident::new(0, 35.10, -106.60, "B", "Property", ""),
    ///     Incident::new(0, 35.20, -106.70, "C", "Violent", ""),
    /// ];
    /// let viewport = Viewport::new(14.0, GeoBounds::new(-106.8, 35.0, -106.5, 35.3));
    /// let projector = WebMercator::for_viewport(&viewport.bounds, viewport.zoom);
    ///
    /// let result = LocationAggregator::default().aggregate(&points, &viewport, &projector, None);
    /// assert_eq!(result.plan.tier, Tier::Clustered);
    /// assert_eq!(result.groups.len(), 2);
    /// assert_eq!(result.total_count(), 3);
    /// ```
    pub fn aggregate<P>(
        &self,
        points: &[Incident],
        viewport: &Viewport,
        projector: &P,
        volume_hint: Option<usize>,
    ) -> Aggregation
    where
        P: Projector + ?Sized,
    {
        let volume = volume_hint.unwrap_or(points.len());
        let zoom = viewport.zoom;
        let mut skipped = 0;

        let (tier, groups) = match self.initial_tier(zoom, volume) {
            Tier::PointsOnly => {
                let groups: Vec<LocationGroup> = points
                    .iter()
                    .filter(|p| {
                        let finite = p.lat.is_finite() && p.lon.is_finite();
                        if !finite {
                            skipped += 1;
                        }
                        finite
                    })
                    .map(LocationGroup::single)
                    .collect();
                (Tier::PointsOnly, groups)
            }
            _ => {
                let (groups, dropped) = self.cluster(points);
                skipped = dropped;
                if groups.len() > self.config.max_groups {
                    log::debug!(
                        "{} location groups exceed cap {}, binning by pixel",
                        groups.len(),
                        self.config.max_groups
                    );
                    let binned = bin_by_pixel(groups, viewport, projector, &self.config);
                    (Tier::PixelBinned, binned)
                } else {
                    (Tier::Clustered, groups)
                }
            }
        };

        if skipped > 0 {
            log::debug!("Skipped {} incidents with non-finite coordinates", skipped);
        }

        let plan = RenderPlan {
            tier,
            icons_eligible: self.icons_eligible(zoom, volume, groups.len()),
            pre_projected: tier == Tier::PixelBinned,
            volume,
            skipped,
        };

        log::debug!(
            "Aggregated {} incidents into {} groups ({:?}, zoom {})",
            points.len(),
            groups.len(),
            tier,
            zoom
        );

        Aggregation { plan, groups }
    }

    /// Group by location key in first-seen order.
    fn cluster(&self, points: &[Incident]) -> (Vec<LocationGroup>, usize) {
        let precision = self.config.key_precision;
        let max_events = self.config.max_events_per_group;

        let mut slots: FxHashMap<GeoCellKey, usize> = FxHashMap::default();
        let mut groups: Vec<LocationGroup> = Vec::new();
        let mut skipped = 0;

        for incident in points {
            if !(incident.lat.is_finite() && incident.lon.is_finite()) {
                skipped += 1;
                continue;
            }
            let key = GeoCellKey::new(incident.lat, incident.lon, precision);
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push(LocationGroup::seeded(incident));
                groups.len() - 1
            });
            groups[slot].record(incident, max_events);
        }

        (groups, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geokey::GeoBounds;
    use crate::projection::WebMercator;

    fn incident(lat: f64, lon: f64, kind: &str) -> Incident {
        Incident::new(0, lat, lon, kind, format!("cat-{}", kind), "")
    }

    fn viewport(zoom: f64) -> Viewport {
        Viewport::new(zoom, GeoBounds::new(-107.0, 34.9, -106.3, 35.4))
    }

    fn run(aggregator: &LocationAggregator, points: &[Incident], zoom: f64) -> Aggregation {
        let vp = viewport(zoom);
        let proj = WebMercator::for_viewport(&vp.bounds, vp.zoom);
        aggregator.aggregate(points, &vp, &proj, None)
    }

    #[test]
    fn test_empty_input() {
        let result = run(&LocationAggregator::default(), &[], 12.0);
        assert!(result.groups.is_empty());
        assert_eq!(result.total_count(), 0);
        assert_eq!(result.plan.tier, Tier::Clustered);
    }

    #[test]
    fn test_clustered_breakdown() {
        let points = vec![
            incident(35.10, -106.60, "A"),
            incident(35.10, -106.60, "A"),
            incident(35.10, -106.60, "B"),
            incident(35.20, -106.70, "C"),
        ];
        let result = run(&LocationAggregator::default(), &points, 14.0);

        assert_eq!(result.plan.tier, Tier::Clustered);
        assert_eq!(result.groups.len(), 2);

        let first = &result.groups[0];
        assert_eq!(first.total, 3);
        assert_eq!(first.breakdown["A"].count, 2);
        assert_eq!(first.breakdown["B"].count, 1);
        assert_eq!(first.breakdown["A"].category, "cat-A");
        assert_eq!(first.events.len(), 3);

        let second = &result.groups[1];
        assert_eq!(second.total, 1);
        assert_eq!(second.breakdown.len(), 1);
        assert_eq!(second.breakdown["C"].count, 1);
        assert!(!second.is_pre_projected());
    }

    #[test]
    fn test_group_keeps_first_seen_position() {
        let points = vec![
            incident(35.1000001, -106.6000001, "A"),
            incident(35.1000002, -106.6000002, "A"),
        ];
        let result = run(&LocationAggregator::default(), &points, 14.0);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].lat, 35.1000001);
        assert_eq!(result.groups[0].lon, -106.6000001);
    }

    #[test]
    fn test_event_cap_keeps_true_total() {
        let aggregator =
            LocationAggregator::new(AggregationConfig::default().with_max_events_per_group(5));
        let points: Vec<_> = (0..12).map(|_| incident(35.1, -106.6, "A")).collect();
        let result = run(&aggregator, &points, 14.0);

        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].total, 12);
        assert_eq!(result.groups[0].events.len(), 5);
        assert_eq!(result.groups[0].breakdown["A"].count, 12);
    }

    #[test]
    fn test_points_only_tier() {
        let aggregator =
            LocationAggregator::new(AggregationConfig::default().with_points_only(13.0, 10));
        let points: Vec<_> = (0..10).map(|_| incident(35.1, -106.6, "A")).collect();

        let far = run(&aggregator, &points, 11.0);
        assert_eq!(far.plan.tier, Tier::PointsOnly);
        assert_eq!(far.groups.len(), 10);
        assert!(far.groups.iter().all(|g| g.total == 1 && g.events.is_empty()));
        assert_eq!(far.total_count(), 10);

        let near = run(&aggregator, &points, 13.0);
        assert_eq!(near.plan.tier, Tier::Clustered);
        assert_eq!(near.groups.len(), 1);

        let small = run(&aggregator, &points[..9], 11.0);
        assert_eq!(small.plan.tier, Tier::Clustered);
    }

    #[test]
    fn test_volume_hint_drives_tier() {
        let aggregator =
            LocationAggregator::new(AggregationConfig::default().with_points_only(13.0, 100));
        let points: Vec<_> = (0..3).map(|_| incident(35.1, -106.6, "A")).collect();
        let vp = viewport(10.0);
        let proj = WebMercator::for_viewport(&vp.bounds, vp.zoom);

        let result = aggregator.aggregate(&points, &vp, &proj, Some(5_000));
        assert_eq!(result.plan.tier, Tier::PointsOnly);
        assert_eq!(result.plan.volume, 5_000);
        assert!(!result.plan.icons_eligible);
    }

    #[test]
    fn test_icon_eligibility() {
        let aggregator =
            LocationAggregator::new(AggregationConfig::default().with_icon_policy(15.0, 3));
        let points = vec![
            incident(35.1, -106.6, "A"),
            incident(35.2, -106.6, "A"),
        ];

        // small volume at any zoom
        assert!(run(&aggregator, &points, 10.0).plan.icons_eligible);

        let many: Vec<_> = (0..4)
            .map(|i| incident(35.1 + i as f64 * 0.01, -106.6, "A"))
            .collect();
        assert!(!run(&aggregator, &many, 16.0).plan.icons_eligible);

        assert!(aggregator.icons_eligible(15.0, 1_000_000, 2));
        assert!(!aggregator.icons_eligible(14.0, 1_000_000, 2));
    }

    #[test]
    fn test_non_finite_incidents_skipped() {
        let points = vec![
            incident(35.1, -106.6, "A"),
            incident(f64::NAN, -106.6, "A"),
            incident(35.1, f64::INFINITY, "A"),
        ];
        let result = run(&LocationAggregator::default(), &points, 14.0);
        assert_eq!(result.total_count(), 1);
        assert_eq!(result.plan.skipped, 2);
    }

    #[test]
    fn test_absorb_merges_breakdown_and_caps_events() {
        let mut a = LocationGroup::single(&incident(35.1, -106.6, "A"));
        a.record(&incident(35.1, -106.6, "B"), 3);
        let mut b = LocationGroup::seeded(&incident(35.2, -106.7, "A"));
        for _ in 0..4 {
            b.record(&incident(35.2, -106.7, "A"), 10);
        }

        a.absorb(b, 3);
        assert_eq!(a.total, 6);
        assert_eq!(a.breakdown["A"].count, 5);
        assert_eq!(a.breakdown["B"].count, 1);
        assert_eq!(a.events.len(), 3);
        assert_eq!(a.lat, 35.1);
        assert_eq!(a.dominant_category(), Some("cat-A"));
    }

    #[test]
    fn test_breakdown_sums_to_total() {
        let kinds = ["A", "B", "C", "D"];
        let points: Vec<_> = (0..200)
            .map(|i| incident(35.0 + (i % 7) as f64 * 0.01, -106.6, kinds[i % kinds.len()]))
            .collect();
        let result = run(&LocationAggregator::default(), &points, 14.0);

        assert_eq!(result.total_count(), 200);
        for group in &result.groups {
            let sum: usize = group.breakdown.values().map(|m| m.count).sum();
            assert_eq!(sum, group.total);
        }
    }
}
