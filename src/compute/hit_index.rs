//! Screen-space grid for "what did the user click" queries.
//!
//! Groups are projected once per build and bucketed into square cells of
//! `cell_px` pixels. A query looks at the 3x3 block of cells around the
//! click only, so its cost does not depend on how many groups are drawn.
//!
//! The index stores group positions by index into the slice it was built
//! from. It must be rebuilt whenever that slice changes or the viewport
//! moves, since cell membership depends on the projection.

use super::aggregate::LocationGroup;
use crate::config::HitTestConfig;
use crate::projection::Projector;
use crate::types::{ScreenCell, ScreenPoint};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Largest radius [`visual_radius`] can return.
pub const MAX_VISUAL_RADIUS: f64 = 22.0;

/// Marker radius in pixels for a group of `total` incidents.
///
/// The renderer must draw with this same function so that hit-testing
/// matches what is on screen.
///
/// # Examples
///
/// ```
/// use geotally::compute::hit_index::{visual_radius, MAX_VISUAL_RADIUS};
///
/// assert!(visual_radius(1) < visual_radius(25));
/// assert_eq!(visual_radius(1_000_000), MAX_VISUAL_RADIUS);
/// ```
pub fn visual_radius(total: usize) -> f64 {
    match total {
        0..=1 => 6.0,
        2..=9 => 10.0,
        10..=49 => 14.0,
        50..=199 => 18.0,
        _ => MAX_VISUAL_RADIUS,
    }
}

#[derive(Debug, Clone, Copy)]
struct HitEntry {
    group: usize,
    position: ScreenPoint,
    radius: f64,
}

/// A successful hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Index of the group in the slice the index was built from.
    pub group: usize,
    /// Squared pixel distance from the query point to the group center.
    pub distance_sq: f64,
}

/// Grid of projected group positions.
#[derive(Debug, Clone, Default)]
pub struct HitIndex {
    cell_px: f64,
    hit_padding: f64,
    entries: Vec<HitEntry>,
    cells: FxHashMap<ScreenCell, SmallVec<[u32; 4]>>,
}

impl HitIndex {
    /// Project and bucket every group.
    ///
    /// Pre-projected groups (pixel bins) are used as-is; everything else goes
    /// through `projector`. Groups that project to a non-finite position are
    /// left out.
    pub fn build<P>(groups: &[LocationGroup], projector: &P, config: &HitTestConfig) -> Self
    where
        P: Projector + ?Sized,
    {
        let mut entries = Vec::with_capacity(groups.len());
        let mut cells: FxHashMap<ScreenCell, SmallVec<[u32; 4]>> = FxHashMap::default();

        for (idx, group) in groups.iter().enumerate() {
            let position = group
                .screen
                .unwrap_or_else(|| projector.project(group.lat, group.lon));
            if !(position.x.is_finite() && position.y.is_finite()) {
                continue;
            }

            let cell = ScreenCell::containing(&position, config.cell_px);
            cells.entry(cell).or_default().push(entries.len() as u32);
            entries.push(HitEntry {
                group: idx,
                position,
                radius: visual_radius(group.total),
            });
        }

        log::debug!(
            "Built hit index: {} groups in {} cells",
            entries.len(),
            cells.len()
        );

        Self {
            cell_px: config.cell_px,
            hit_padding: config.hit_padding,
            entries,
            cells,
        }
    }

    /// Nearest group whose padded marker contains `point`, if any.
    ///
    /// Equal distances resolve to the first candidate in scan order (cells
    /// left to right, top to bottom; build order inside a cell).
    pub fn query(&self, point: ScreenPoint) -> Option<Hit> {
        if self.entries.is_empty() || !(point.x.is_finite() && point.y.is_finite()) {
            return None;
        }

        let center = ScreenCell::containing(&point, self.cell_px);
        let mut best: Option<Hit> = None;

        for drow in -1..=1 {
            for dcol in -1..=1 {
                let Some(bucket) = self.cells.get(&center.offset(dcol, drow)) else {
                    continue;
                };
                for &slot in bucket {
                    let entry = &self.entries[slot as usize];
                    let distance_sq = entry.position.distance_sq(&point);
                    let reach = entry.radius + self.hit_padding;
                    if distance_sq > reach * reach {
                        continue;
                    }
                    if best.is_none_or(|b| distance_sq < b.distance_sq) {
                        best = Some(Hit {
                            group: entry.group,
                            distance_sq,
                        });
                    }
                }
            }
        }

        best
    }

    /// Number of indexed groups.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of non-empty grid cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}
