//! Caller-owned redraw state.
//!
//! The engine keeps no hidden state between calls: the current groups and
//! their hit index travel together in a [`RenderFrame`], pending rebuilds go
//! through a latest-wins [`FrameScheduler`], and results computed under an
//! older render mode are filtered out with an [`Epoch`] check when they are
//! applied.

use crate::compute::aggregate::{Aggregation, LocationGroup};
use crate::compute::hit_index::{Hit, HitIndex};
use crate::config::HitTestConfig;
use crate::projection::Projector;
use crate::types::ScreenPoint;

/// Groups from one aggregation pass plus the hit index built over them.
///
/// Replaced wholesale on every rebuild, never patched.
#[derive(Debug, Clone)]
pub struct RenderFrame {
    aggregation: Aggregation,
    index: HitIndex,
}

impl RenderFrame {
    pub fn new<P>(aggregation: Aggregation, projector: &P, config: &HitTestConfig) -> Self
    where
        P: Projector + ?Sized,
    {
        let index = HitIndex::build(&aggregation.groups, projector, config);
        Self { aggregation, index }
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn groups(&self) -> &[LocationGroup] {
        &self.aggregation.groups
    }

    pub fn index(&self) -> &HitIndex {
        &self.index
    }

    /// Rebuild the hit index after a pan, zoom or resize.
    ///
    /// Pre-projected positions are refreshed from their coordinates first,
    /// since they belong to the old viewport.
    pub fn reproject<P>(&mut self, projector: &P, config: &HitTestConfig)
    where
        P: Projector + ?Sized,
    {
        for group in &mut self.aggregation.groups {
            if let Some(screen) = group.screen.as_mut() {
                *screen = projector.project(group.lat, group.lon);
            }
        }
        self.index = HitIndex::build(&self.aggregation.groups, projector, config);
    }

    /// Group under a screen point, if any.
    pub fn hit(&self, point: ScreenPoint) -> Option<&LocationGroup> {
        self.hit_detail(point)
            .and_then(|hit| self.aggregation.groups.get(hit.group))
    }

    pub fn hit_detail(&self, point: ScreenPoint) -> Option<Hit> {
        self.index.query(point)
    }
}

/// Latest-wins debounce for animation-frame rebuilds.
///
/// Scheduling while a request is pending replaces it; the older request is
/// cancelled, not queued.
#[derive(Debug, Clone)]
pub struct FrameScheduler<T> {
    pending: Option<T>,
    superseded: u64,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self {
            pending: None,
            superseded: 0,
        }
    }
}

impl<T> FrameScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `request` for the next frame. Returns true when it replaced a
    /// request that had not run yet.
    pub fn schedule(&mut self, request: T) -> bool {
        let replaced = self.pending.replace(request).is_some();
        if replaced {
            self.superseded += 1;
        }
        replaced
    }

    /// Called when a frame fires: hands out the most recent request.
    pub fn take_frame(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Drop the pending request without running it.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Requests replaced before they could run.
    pub fn superseded(&self) -> u64 {
        self.superseded
    }
}

/// Snapshot of an [`Epoch`] taken when work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpochToken(u64);

/// Generation counter bumped on every render-mode switch.
///
/// Work is never aborted; its result is simply not applied once the epoch
/// has moved on.
#[derive(Debug, Clone, Default)]
pub struct Epoch {
    current: u64,
}

impl Epoch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for work starting now.
    pub fn token(&self) -> EpochToken {
        EpochToken(self.current)
    }

    /// Move to a new generation, making every outstanding token stale.
    pub fn advance(&mut self) -> EpochToken {
        self.current += 1;
        EpochToken(self.current)
    }

    pub fn is_current(&self, token: EpochToken) -> bool {
        token.0 == self.current
    }

    /// Run `apply` only when `token` is still current.
    pub fn apply_if_current<R>(&self, token: EpochToken, apply: impl FnOnce() -> R) -> Option<R> {
        if self.is_current(token) {
            Some(apply())
        } else {
            log::debug!(
                "Discarding result from epoch {} (now {})",
                token.0,
                self.current
            );
            None
        }
    }
}
