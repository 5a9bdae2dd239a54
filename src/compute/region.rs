//! Per-region incident counts via ray-casting point-in-polygon.
//!
//! Regions are loaded once per session through a [`RegionSource`] and kept
//! in a [`RegionStore`]. [`RegionCounter`] attributes each incident to the
//! first region that contains it and keeps a single-slot cache keyed by the
//! serialized filter descriptor, so the expensive pass only runs when the
//! descriptor changes or the cache is invalidated explicitly.
//!
//! # Invalidation contract
//!
//! The cache key only sees the descriptor. When the incident set changes
//! while the descriptor stays the same (e.g. another page of data is merged
//! in), the caller must call [`RegionCounter::invalidate`] or stale counts
//! will be served.

use crate::compute::validation::is_usable_ring;
use crate::error::{Result, TallyError};
use crate::geokey::GeoBounds;
use crate::types::Incident;
use geo::Coord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Incident count per region id.
pub type RegionCounts = BTreeMap<String, usize>;

/// Default stand-in for a zero vertical edge span.
pub const DEFAULT_EDGE_EPSILON: f64 = 1e-12;

/// One polygon ring (`x` = lon, `y` = lat) with its precomputed bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    coords: Vec<Coord>,
    bbox: GeoBounds,
}

impl Ring {
    /// Build a ring, or `None` when it has fewer than three usable vertices.
    pub fn new(coords: Vec<Coord>) -> Option<Self> {
        if !is_usable_ring(&coords) {
            return None;
        }
        let bbox = GeoBounds::from_coords(&coords)?;
        Some(Self { coords, bbox })
    }

    pub fn coords(&self) -> &[Coord] {
        &self.coords
    }

    pub fn bbox(&self) -> &GeoBounds {
        &self.bbox
    }

    /// Bounding-box rejection followed by the ray-casting test.
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64, edge_epsilon: f64) -> bool {
        self.bbox.contains(lat, lon) && point_in_ring(&self.coords, lat, lon, edge_epsilon)
    }
}

/// Even-odd ray-casting test of `(lat, lon)` against a ring.
///
/// An edge is only tested when its endpoints straddle the ray, so its
/// vertical span is never zero there and `edge_epsilon` does not change the
/// outcome; it only stands in for a zero span in the division. Points exactly
/// on an edge get whatever answer the crossing count produces: on an
/// axis-aligned ring the bottom and left edges count as inside, the top and
/// right edges as outside.
///
/// # Examples
///
/// ```
/// use geo::Coord;
/// use geotally::compute::region::point_in_ring;
///
/// let square = [
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 0.0, y: 10.0 },
///     Coord { x: 10.0, y: 10.0 },
///     Coord { x: 10.0, y: 0.0 },
/// ];
/// assert!(point_in_ring(&square, 5.0, 5.0, 1e-12));
/// assert!(!point_in_ring(&square, 15.0, 15.0, 1e-12));
/// ```
pub fn point_in_ring(coords: &[Coord], lat: f64, lon: f64, edge_epsilon: f64) -> bool {
    let n = coords.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (coords[i].x, coords[i].y);
        let (xj, yj) = (coords[j].x, coords[j].y);

        if (yi > lat) != (yj > lat) {
            let span = yj - yi;
            let span = if span == 0.0 { edge_epsilon } else { span };
            if lon < (xj - xi) * (lat - yi) / span + xi {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// A named region: ring 0 is the outer boundary, later rings are holes.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFeature {
    pub id: String,
    rings: Vec<Ring>,
}

impl RegionFeature {
    /// Build a region from raw rings.
    ///
    /// Malformed holes are dropped. A malformed outer ring leaves the region
    /// without rings, so it never contains anything but still shows up in
    /// the counts with zero.
    pub fn new(id: impl Into<String>, rings: Vec<Vec<Coord>>) -> Self {
        let id = id.into();
        let mut iter = rings.into_iter();

        let Some(outer) = iter.next().and_then(Ring::new) else {
            log::warn!("Region {} has no usable outer ring", id);
            return Self {
                id,
                rings: Vec::new(),
            };
        };

        let mut kept = vec![outer];
        for hole in iter {
            match Ring::new(hole) {
                Some(ring) => kept.push(ring),
                None => log::debug!("Dropping malformed hole in region {}", id),
            }
        }

        Self { id, rings: kept }
    }

    /// Build a region from `(lon, lat)` pairs.
    pub fn from_lon_lat(id: impl Into<String>, rings: Vec<Vec<(f64, f64)>>) -> Self {
        let rings = rings
            .into_iter()
            .map(|ring| ring.into_iter().map(|(x, y)| Coord { x, y }).collect())
            .collect();
        Self::new(id, rings)
    }

    /// Build a region from a `geo::Polygon` in lon/lat order.
    pub fn from_polygon(id: impl Into<String>, polygon: &geo::Polygon) -> Self {
        let mut rings = Vec::with_capacity(1 + polygon.interiors().len());
        rings.push(polygon.exterior().0.clone());
        rings.extend(polygon.interiors().iter().map(|ring| ring.0.clone()));
        Self::new(id, rings)
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    /// Bounding box of the outer ring.
    pub fn bounds(&self) -> Option<&GeoBounds> {
        self.rings.first().map(Ring::bbox)
    }

    /// Inside the outer ring and outside every hole.
    pub fn contains(&self, lat: f64, lon: f64, edge_epsilon: f64) -> bool {
        let Some((outer, holes)) = self.rings.split_first() else {
            return false;
        };
        if !outer.contains(lat, lon, edge_epsilon) {
            return false;
        }
        !holes.iter().any(|hole| hole.contains(lat, lon, edge_epsilon))
    }
}

/// Count incidents per region, attributing each to the first region (in
/// slice order) that contains it.
///
/// Every region id appears in the result, with zero when nothing falls
/// inside. Incidents outside all regions, or with non-finite coordinates,
/// are not counted.
pub fn count_regions(
    points: &[Incident],
    regions: &[RegionFeature],
    edge_epsilon: f64,
) -> RegionCounts {
    let mut tallies = vec![0usize; regions.len()];

    for point in points {
        if !(point.lat.is_finite() && point.lon.is_finite()) {
            continue;
        }
        if let Some(slot) = regions
            .iter()
            .position(|region| region.contains(point.lat, point.lon, edge_epsilon))
        {
            tallies[slot] += 1;
        }
    }

    let mut counts = RegionCounts::new();
    for (region, tally) in regions.iter().zip(tallies) {
        *counts.entry(region.id.clone()).or_insert(0) += tally;
    }
    counts
}

/// Supplies region polygons, typically by fetching them once over the
/// network.
pub trait RegionSource {
    fn load_regions(&self) -> Result<Vec<RegionFeature>>;
}

impl<F> RegionSource for F
where
    F: Fn() -> Result<Vec<RegionFeature>>,
{
    fn load_regions(&self) -> Result<Vec<RegionFeature>> {
        self()
    }
}

/// Region polygons for the session, loaded at most once.
#[derive(Debug, Clone, Default)]
pub struct RegionStore {
    features: Option<Arc<[RegionFeature]>>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load regions from `source` unless they are already loaded.
    ///
    /// A failed load leaves the store empty so a later call can retry.
    pub fn ensure_loaded<S>(&mut self, source: &S) -> Result<&[RegionFeature]>
    where
        S: RegionSource + ?Sized,
    {
        if self.features.is_none() {
            let features = source.load_regions()?;
            if features.is_empty() {
                return Err(TallyError::RegionSource(
                    "Region source returned no features".to_string(),
                ));
            }
            log::info!("Loaded {} region features", features.len());
            self.features = Some(features.into());
        }
        Ok(self.features.as_deref().unwrap_or_default())
    }

    pub fn is_loaded(&self) -> bool {
        self.features.is_some()
    }

    /// Loaded regions, or `None` before the first successful load.
    pub fn get(&self) -> Option<&[RegionFeature]> {
        self.features.as_deref()
    }

    /// Shared handle to the loaded regions.
    pub fn shared(&self) -> Option<Arc<[RegionFeature]>> {
        self.features.clone()
    }
}

#[derive(Debug, Clone)]
struct CachedCounts {
    key: String,
    counts: Arc<RegionCounts>,
}

/// Region counting with a single-slot, descriptor-keyed cache.
#[derive(Debug, Clone)]
pub struct RegionCounter {
    edge_epsilon: f64,
    cache: Option<CachedCounts>,
    recomputations: u64,
}

impl Default for RegionCounter {
    fn default() -> Self {
        Self::new(DEFAULT_EDGE_EPSILON)
    }
}

impl RegionCounter {
    pub fn new(edge_epsilon: f64) -> Self {
        Self {
            edge_epsilon,
            cache: None,
            recomputations: 0,
        }
    }

    /// Serialize a filter descriptor into its cache key.
    pub fn cache_key<D>(descriptor: &D) -> Result<String>
    where
        D: Serialize + ?Sized,
    {
        Ok(serde_json::to_string(descriptor)?)
    }

    /// Counts for `points` under `descriptor`.
    ///
    /// Returns the cached counts unchanged when `descriptor` serializes to the
    /// cached key; otherwise discards the cache and recounts from scratch.
    /// With `regions` not loaded yet, returns empty counts and leaves the
    /// cache untouched.
    ///
    /// # Examples
    ///
    /// ```
    /// use geotally::{FilterState, Incident, RegionCounter, RegionFeature};
    ///
    /// let regions = vec![RegionFeature::from_lon_lat(
    ///     "87102",
    ///     vec![vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]],
    /// )];
    /// let points = vec![Incident::new(0, 5.0, 5.0, "Theft", "Property", "")];
    ///
    /// let mut counter = RegionCounter::default();
    /// let filters = FilterState::default().with_category("Property");
    /// let counts = counter.count(&points, Some(&regions[..]), &filters)?;
    /// assert_eq!(counts["87102"], 1);
    ///
    /// counter.count(&points, Some(&regions[..]), &filters)?;
    /// assert_eq!(counter.recomputations(), 1);
    /// # Ok::<(), geotally::TallyError>(())
    /// ```
    pub fn count<D>(
        &mut self,
        points: &[Incident],
        regions: Option<&[RegionFeature]>,
        descriptor: &D,
    ) -> Result<Arc<RegionCounts>>
    where
        D: Serialize + ?Sized,
    {
        let Some(regions) = regions else {
            log::debug!("Regions not loaded, returning empty counts");
            return Ok(Arc::new(RegionCounts::new()));
        };

        let key = Self::cache_key(descriptor)?;
        if let Some(cached) = &self.cache
            && cached.key == key
        {
            log::debug!("Region count cache hit");
            return Ok(Arc::clone(&cached.counts));
        }

        let counts = Arc::new(count_regions(points, regions, self.edge_epsilon));
        self.recomputations += 1;
        log::info!(
            "Counted {} incidents across {} regions",
            points.len(),
            regions.len()
        );

        self.cache = Some(CachedCounts {
            key,
            counts: Arc::clone(&counts),
        });
        Ok(counts)
    }

    /// Drop the cached counts so the next [`count`](Self::count) recomputes.
    pub fn invalidate(&mut self) {
        if self.cache.take().is_some() {
            log::debug!("Region count cache invalidated");
        }
    }

    /// Key of the cached counts, if any.
    pub fn cached_key(&self) -> Option<&str> {
        self.cache.as_ref().map(|c| c.key.as_str())
    }

    /// Number of full counting passes run so far.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
