//! Compute layer for aggregation, hit-testing and region counting.
//!
//! Everything here is a plain function or a small owned struct over slices
//! of incidents. Nothing touches the renderer; callers hand in a
//! [`Projector`](crate::projection::Projector) when screen positions are needed.

pub mod aggregate;
mod binning;
#[cfg(feature = "geojson")]
pub mod geojson;
pub mod hit_index;
pub mod region;
pub mod validation;
