//! Dashboard Frame Example
//!
//! Walks through one session of an incident map: draw incidents, answer a
//! click, switch to the region choropleth and back.

use geotally::prelude::*;
use geotally::{FrameScheduler, RegionCounter};
use std::error::Error;

const ZIPS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "zip": "87102" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-106.66, 35.07], [-106.66, 35.10], [-106.63, 35.10], [-106.63, 35.07], [-106.66, 35.07]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "zip": "87106" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-106.63, 35.07], [-106.63, 35.10], [-106.60, 35.10], [-106.60, 35.07], [-106.63, 35.07]]]
      }
    }
  ]
}"#;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    env_logger::init();

    println!("=== Incident Dashboard Frame ===\n");

    let mut engine = Engine::builder().build()?;

    let incidents = vec![
        Incident::new(1_700_000_000_000, 35.0844, -106.6504, "Burglary", "Property", "400 Gold Ave SW"),
        Incident::new(1_700_000_360_000, 35.0844, -106.6504, "Larceny", "Property", "400 Gold Ave SW"),
        Incident::new(1_700_000_720_000, 35.0844, -106.6504, "Burglary", "Property", "400 Gold Ave SW"),
        Incident::new(1_700_001_080_000, 35.0853, -106.6056, "Assault", "Violent", "1900 Central Ave SE"),
        Incident::new(1_700_001_440_000, 35.0912, -106.6219, "Vandalism", "Other", "500 Yale Blvd SE"),
    ];

    // === 1. Redraw, debounced to the latest viewport ===
    println!("1. Redrawing incidents");
    let mut scheduler = FrameScheduler::new();
    scheduler.schedule(Viewport::new(13.0, GeoBounds::new(-106.75, 35.00, -106.50, 35.20)));
    scheduler.schedule(Viewport::new(16.0, GeoBounds::new(-106.68, 35.06, -106.58, 35.11)));
    println!("   {} stale request(s) superseded", scheduler.superseded());

    let Some(viewport) = scheduler.take_frame() else {
        return Ok(());
    };
    let projector = WebMercator::for_viewport(&viewport.bounds, viewport.zoom);
    let frame = engine.redraw(&incidents, &viewport, &projector, None);
    let plan = frame.aggregation().plan;
    println!(
        "   {:?} tier, {} groups, icons: {}\n",
        plan.tier,
        frame.groups().len(),
        plan.icons_eligible
    );

    // === 2. Click ===
    println!("2. Clicking on Gold Ave");
    let click = projector.project(35.0844, -106.6504);
    if let Some(group) = engine.hit_test(click) {
        println!("   {} incidents here:", group.total);
        for (kind, meta) in &group.breakdown {
            println!("     {} x{} ({})", kind, meta.count, meta.category);
        }
    }
    println!();

    // === 3. Choropleth ===
    println!("3. Region counts");
    let source = GeoJsonSource::new(ZIPS, engine.config().regions.id_property.clone());
    let loaded = engine.ensure_regions_loaded(&source)?.len();
    println!("   Loaded {} regions", loaded);

    let token = engine.switch_mode(RenderMode::Regions);
    let filters = FilterState::default().with_category("Property");
    println!("   Cache key: {}", RegionCounter::cache_key(&filters)?);

    let counts = engine.region_counts(&incidents, &filters)?;
    engine.apply_region_counts(token, counts);
    if let Some(visible) = engine.visible_counts() {
        for (zip, count) in visible {
            println!("     {}: {}", zip, count);
        }
    }

    // Same filters: served from the cache
    engine.region_counts(&incidents, &filters)?;
    println!(
        "   Full passes so far: {}\n",
        engine.region_counter().recomputations()
    );

    // === 4. Mode switch while a count is in flight ===
    println!("4. Switching back before a count lands");
    let token = engine.epoch_token();
    let counts = engine.region_counts(&incidents, &FilterState::default())?;
    engine.switch_mode(RenderMode::Incidents);
    let applied = engine.apply_region_counts(token, counts);
    println!("   Stale counts applied: {}", applied);

    Ok(())
}
