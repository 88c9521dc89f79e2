//! Export round-trips through the public entry points.

use std::fs;

use geoconv_core::export::{export, ExportOptions};
use geoconv_core::formats::read_collection;
use geoconv_core::model::{Feature, FeatureCollection};
use geoconv_core::registry::OutputFormat;

fn point_collection() -> FeatureCollection {
    let mut collection = FeatureCollection::new("sites", Some(4326));
    for (i, (x, y)) in [(77.59, 12.97), (77.61, 12.99)].iter().enumerate() {
        let mut feature = Feature::new(Some(geo::Geometry::Point(geo::Point::new(*x, *y))));
        feature.properties.insert("name".to_string(), serde_json::json!(format!("site-{i}")));
        feature.properties.insert("elevation".to_string(), serde_json::json!(900.0 + i as f64));
        collection.push(feature);
    }
    collection
}

#[test]
fn every_format_exports_an_empty_collection() {
    let collection = FeatureCollection::new("empty", Some(4326));
    let scratch = tempfile::tempdir().unwrap();

    for format in OutputFormat::ALL {
        let artifact = export(&collection, format, "empty", scratch.path(), &ExportOptions::default())
            .unwrap_or_else(|e| panic!("{format} export of empty collection failed: {e}"));
        assert!(!artifact.bytes.is_empty(), "{format} produced no bytes");
        assert!(artifact.file_name.starts_with("empty."));
    }
}

#[test]
fn shapefile_zip_round_trips_through_ingestion() {
    let collection = point_collection();
    let scratch = tempfile::tempdir().unwrap();

    let artifact = export(
        &collection,
        OutputFormat::Shapefile,
        "sites",
        scratch.path(),
        &ExportOptions::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let zip_path = dir.path().join("sites.zip");
    fs::write(&zip_path, &artifact.bytes).unwrap();

    let read_scratch = tempfile::tempdir().unwrap();
    let read_back = read_collection(&zip_path, read_scratch.path(), None).unwrap();

    assert_eq!(read_back.len(), 2);
    // CRS survives via the bundled .prj.
    assert_eq!(read_back.crs, Some(4326));
    assert_eq!(
        read_back.features[0].properties.get("name"),
        Some(&serde_json::json!("site-0"))
    );
    match &read_back.features[1].geometry {
        Some(geo::Geometry::Point(p)) => {
            assert!((p.x() - 77.61).abs() < 1e-6);
            assert!((p.y() - 12.99).abs() < 1e-6);
        }
        other => panic!("expected point, got {other:?}"),
    }
}

#[test]
fn geopackage_round_trips_through_ingestion() {
    let collection = point_collection();
    let scratch = tempfile::tempdir().unwrap();

    let artifact = export(
        &collection,
        OutputFormat::Gpkg,
        "sites",
        scratch.path(),
        &ExportOptions::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let gpkg_path = dir.path().join("sites.gpkg");
    fs::write(&gpkg_path, &artifact.bytes).unwrap();

    let read_scratch = tempfile::tempdir().unwrap();
    let read_back = read_collection(&gpkg_path, read_scratch.path(), None).unwrap();

    assert_eq!(read_back.len(), 2);
    assert_eq!(read_back.crs, Some(4326));
    assert_eq!(
        read_back.features[1].properties.get("elevation"),
        Some(&serde_json::json!(901.0))
    );
}

#[test]
fn geojson_export_parses_as_geojson() {
    let collection = point_collection();
    let scratch = tempfile::tempdir().unwrap();

    let artifact = export(
        &collection,
        OutputFormat::GeoJson,
        "sites",
        scratch.path(),
        &ExportOptions::default(),
    )
    .unwrap();

    let parsed: geojson::GeoJson =
        String::from_utf8(artifact.bytes).unwrap().parse().unwrap();
    match parsed {
        geojson::GeoJson::FeatureCollection(fc) => assert_eq!(fc.features.len(), 2),
        other => panic!("expected feature collection, got {other:?}"),
    }
}

#[test]
fn kml_export_reads_back_with_names() {
    let collection = point_collection();
    let scratch = tempfile::tempdir().unwrap();

    let artifact = export(
        &collection,
        OutputFormat::Kml,
        "sites",
        scratch.path(),
        &ExportOptions::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let kml_path = dir.path().join("sites.kml");
    fs::write(&kml_path, &artifact.bytes).unwrap();

    let read_scratch = tempfile::tempdir().unwrap();
    let read_back = read_collection(&kml_path, read_scratch.path(), None).unwrap();

    assert_eq!(read_back.len(), 2);
    assert_eq!(
        read_back.features[0].properties.get("name"),
        Some(&serde_json::json!("site-0"))
    );
}
