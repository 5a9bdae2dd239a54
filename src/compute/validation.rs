//! Validation for incident coordinates, viewports and polygon rings.
//!
//! The aggregation and counting passes never fail on a bad record; they
//! skip it. These helpers let callers enforce the same preconditions
//! upstream and find out what was dropped.

use crate::error::{Result, TallyError};
use crate::geokey::GeoBounds;
use crate::types::Incident;
use geo::Coord;

/// True when both coordinates are finite and inside WGS84 ranges.
///
/// # Examples
///
/// ```
/// use geotally::compute::validation::is_valid_coordinate;
///
/// assert!(is_valid_coordinate(35.08, -106.65));
/// assert!(!is_valid_coordinate(f64::NAN, -106.65));
/// assert!(!is_valid_coordinate(95.0, -106.65));
/// ```
#[inline]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Validates one incident's coordinates.
pub fn validate_incident(incident: &Incident) -> Result<()> {
    if !incident.lon.is_finite() {
        return Err(TallyError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            incident.lon
        )));
    }

    if !incident.lat.is_finite() {
        return Err(TallyError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            incident.lat
        )));
    }

    if !(-180.0..=180.0).contains(&incident.lon) {
        return Err(TallyError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            incident.lon
        )));
    }

    if !(-90.0..=90.0).contains(&incident.lat) {
        return Err(TallyError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            incident.lat
        )));
    }

    Ok(())
}

/// Validates every incident, reporting the first bad index.
pub fn validate_incidents(incidents: &[Incident]) -> Result<()> {
    for (idx, incident) in incidents.iter().enumerate() {
        validate_incident(incident)
            .map_err(|e| TallyError::InvalidInput(format!("Incident at index {}: {}", idx, e)))?;
    }
    Ok(())
}

/// Drops incidents with invalid coordinates in place and returns how many
/// were removed.
///
/// # Examples
///
/// ```
/// use geotally::Incident;
/// use geotally::compute::validation::retain_valid;
///
/// let mut incidents = vec![
///     Incident::new(0, 35.1, -106.6, "Theft", "Property", ""),
///     Incident::new(0, f64::NAN, -106.6, "Theft", "Property", ""),
/// ];
/// assert_eq!(retain_valid(&mut incidents), 1);
/// assert_eq!(incidents.len(), 1);
/// ```
pub fn retain_valid(incidents: &mut Vec<Incident>) -> usize {
    let before = incidents.len();
    incidents.retain(|incident| is_valid_coordinate(incident.lat, incident.lon));
    let dropped = before - incidents.len();
    if dropped > 0 {
        log::warn!("Dropped {} incidents with invalid coordinates", dropped);
    }
    dropped
}

/// Validates viewport bounds: finite and correctly ordered.
pub fn validate_bounds(bounds: &GeoBounds) -> Result<()> {
    let edges = [bounds.west, bounds.south, bounds.east, bounds.north];
    if edges.iter().any(|v| !v.is_finite()) {
        return Err(TallyError::InvalidInput(format!(
            "Bounds must be finite, got: {:?}",
            bounds
        )));
    }
    if bounds.west > bounds.east {
        return Err(TallyError::InvalidInput(format!(
            "west ({}) must be <= east ({})",
            bounds.west, bounds.east
        )));
    }
    if bounds.south > bounds.north {
        return Err(TallyError::InvalidInput(format!(
            "south ({}) must be <= north ({})",
            bounds.south, bounds.north
        )));
    }
    Ok(())
}

/// True when a ring has at least three distinct vertices, all finite.
///
/// A trailing vertex that repeats the first one closes the ring and is not
/// counted.
pub fn is_usable_ring(coords: &[Coord]) -> bool {
    if coords.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return false;
    }
    let open_len = match (coords.first(), coords.last()) {
        (Some(first), Some(last)) if coords.len() > 1 && first == last => coords.len() - 1,
        _ => coords.len(),
    };
    open_len >= 3
}
