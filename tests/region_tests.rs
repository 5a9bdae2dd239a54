use geotally::{
    Engine, FilterState, GeoJsonSource, Incident, RegionCounter, RegionFeature, RenderMode,
    Result, TallyError, count_regions, regions_from_geojson,
};

const ZIPS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "zip": "87102", "name": "Downtown" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-106.66, 35.07], [-106.66, 35.10], [-106.63, 35.10], [-106.63, 35.07], [-106.66, 35.07]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "zip": "87106", "name": "University" },
      "geometry": {
        "type": "MultiPolygon",
        "coordinates": [
          [[[-106.63, 35.07], [-106.63, 35.10], [-106.60, 35.10], [-106.60, 35.07], [-106.63, 35.07]]],
          [[[-106.58, 35.07], [-106.58, 35.08], [-106.57, 35.08], [-106.57, 35.07], [-106.58, 35.07]]]
        ]
      }
    },
    {
      "type": "Feature",
      "properties": { "zip": "87110" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-106.60, 35.10], [-106.60, 35.13], [-106.57, 35.13], [-106.57, 35.10], [-106.60, 35.10]]]
      }
    }
  ]
}"#;

fn at(lat: f64, lon: f64) -> Incident {
    Incident::new(0, lat, lon, "Larceny", "Property", "")
}

fn unit_square() -> Vec<RegionFeature> {
    vec![RegionFeature::from_lon_lat(
        "square",
        vec![vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]],
    )]
}

#[test]
fn test_square_region() {
    let regions = unit_square();
    let counts = count_regions(&[at(5.0, 5.0)], &regions, 1e-12);
    assert_eq!(counts["square"], 1);

    let counts = count_regions(&[at(15.0, 15.0)], &regions, 1e-12);
    assert_eq!(counts["square"], 0);
}

#[test]
fn test_counts_from_geojson() {
    let regions = regions_from_geojson(ZIPS, "zip").unwrap();
    assert_eq!(regions.len(), 4);

    let points = vec![
        at(35.08, -106.65),
        at(35.09, -106.64),
        at(35.08, -106.61),
        at(35.075, -106.575),
        at(35.12, -106.58),
        at(36.00, -106.00),
    ];
    let counts = count_regions(&points, &regions, 1e-12);

    assert_eq!(counts.len(), 3);
    assert_eq!(counts["87102"], 2);
    // both parts of the multipolygon count toward one id
    assert_eq!(counts["87106"], 2);
    assert_eq!(counts["87110"], 1);
    assert_eq!(counts.values().sum::<usize>(), 5);
}

#[test]
fn test_id_property_fallback_and_override() {
    let by_name = regions_from_geojson(ZIPS, "name").unwrap();
    // the third feature has neither a name nor a feature id
    assert_eq!(by_name.len(), 3);
    assert_eq!(by_name[0].id, "Downtown");
}

#[test]
fn test_cache_reuse_and_recompute() {
    let regions = unit_square();
    let mut counter = RegionCounter::default();
    let mut points = vec![at(1.0, 1.0), at(2.0, 2.0)];

    let filters = FilterState::default().with_category("Property").with_hour(22);
    let first = counter.count(&points, Some(&regions[..]), &filters).unwrap();
    assert_eq!(first["square"], 2);

    // unchanged descriptor: served from cache even though points changed
    points.push(at(3.0, 3.0));
    let cached = counter.count(&points, Some(&regions[..]), &filters).unwrap();
    assert_eq!(cached["square"], 2);
    assert_eq!(counter.recomputations(), 1);

    // changed descriptor recomputes
    let filters = filters.with_weekday(5);
    let fresh = counter.count(&points, Some(&regions[..]), &filters).unwrap();
    assert_eq!(fresh["square"], 3);
    assert_eq!(counter.recomputations(), 2);
    assert_eq!(
        counter.cached_key().unwrap(),
        RegionCounter::cache_key(&filters).unwrap()
    );
}

#[test]
fn test_engine_choropleth_flow() {
    let mut engine = Engine::builder().build().unwrap();
    let source = GeoJsonSource::new(ZIPS, engine.config().regions.id_property.clone());
    assert_eq!(engine.ensure_regions_loaded(&source).unwrap().len(), 4);
    // second load is a no-op
    let failing = || -> Result<Vec<RegionFeature>> {
        Err(TallyError::RegionSource("offline".to_string()))
    };
    assert_eq!(engine.ensure_regions_loaded(&failing).unwrap().len(), 4);

    let token = engine.switch_mode(RenderMode::Regions);
    let filters = FilterState::default().with_window(0, 1_000);
    let counts = engine
        .region_counts(&[at(35.08, -106.65)], &filters)
        .unwrap();
    assert!(engine.apply_region_counts(token, counts));
    assert_eq!(engine.visible_counts().unwrap()["87102"], 1);
    assert_eq!(engine.visible_counts().unwrap()["87110"], 0);
}

#[test]
fn test_region_load_failure_can_retry() {
    let mut engine = Engine::builder().build().unwrap();
    let failing = || -> Result<Vec<RegionFeature>> {
        Err(TallyError::RegionSource("timeout".to_string()))
    };
    assert!(engine.ensure_regions_loaded(&failing).is_err());
    assert!(engine.regions().is_none());

    let empty = || -> Result<Vec<RegionFeature>> { Ok(Vec::new()) };
    assert!(matches!(
        engine.ensure_regions_loaded(&empty),
        Err(TallyError::RegionSource(_))
    ));

    let source = GeoJsonSource::new(ZIPS, "zip");
    assert!(engine.ensure_regions_loaded(&source).is_ok());
    assert!(engine.regions().is_some());
}
