//! Pixel binning for when location grouping alone leaves too many groups.

use super::aggregate::LocationGroup;
use crate::config::AggregationConfig;
use crate::projection::Projector;
use crate::types::{ScreenCell, Viewport};
use rustc_hash::FxHashMap;

/// Re-bin location groups by projected pixel cell.
///
/// Groups outside the viewport bounds are dropped before projection. Each bin
/// keeps the position of the first group that landed in it, already projected
/// into `screen`, and at most `max_bin_events` event samples.
pub(crate) fn bin_by_pixel<P>(
    groups: Vec<LocationGroup>,
    viewport: &Viewport,
    projector: &P,
    config: &AggregationConfig,
) -> Vec<LocationGroup>
where
    P: Projector + ?Sized,
{
    let cell_px = config.bin_cell_px(viewport.zoom);
    let max_events = config.max_bin_events;

    let mut slots: FxHashMap<ScreenCell, usize> = FxHashMap::default();
    let mut bins: Vec<LocationGroup> = Vec::new();
    let mut culled = 0usize;
    let input_len = groups.len();

    for mut group in groups {
        if !viewport.bounds.contains(group.lat, group.lon) {
            culled += group.total;
            continue;
        }

        let position = projector.project(group.lat, group.lon);
        let cell = ScreenCell::containing(&position, cell_px);

        match slots.get(&cell) {
            Some(&slot) => bins[slot].absorb(group, max_events),
            None => {
                group.events.truncate(max_events);
                group.screen = Some(position);
                slots.insert(cell, bins.len());
                bins.push(group);
            }
        }
    }

    if culled > 0 {
        log::debug!("Culled {} incidents outside the viewport before binning", culled);
    }
    log::debug!(
        "Binned {} groups into {} cells of {} px",
        input_len,
        bins.len(),
        cell_px
    );

    bins
}
