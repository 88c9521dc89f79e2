//! Ingestion entry-point tests across formats.

use std::fs;
use std::io::Write;

use geoconv_core::error::ConvertError;
use geoconv_core::formats::{read_collection, TabularMapping};

#[test]
fn csv_points_with_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("stations.csv");
    fs::write(
        &path,
        "station,latitude,longitude,height\n\
         alpha,12.97,77.59,912\n\
         beta,,77.61,850\n\
         gamma,13.01,77.65,\n",
    )
    .unwrap();

    let mapping = TabularMapping::new("latitude", "longitude").with_epsg(4326);
    let collection = read_collection(&path, scratch.path(), Some(&mapping)).unwrap();

    // The row with the empty latitude is dropped without failing the read.
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.crs, Some(4326));
    assert_eq!(collection.name, "stations");
    assert_eq!(
        collection.features[0].properties.get("station"),
        Some(&serde_json::json!("alpha"))
    );
    assert_eq!(
        collection.features[0].properties.get("height"),
        Some(&serde_json::json!(912.0))
    );
    // Empty attribute cells come through as null, not empty strings.
    assert_eq!(
        collection.features[1].properties.get("height"),
        Some(&serde_json::Value::Null)
    );
}

#[test]
fn tabular_without_mapping_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("points.csv");
    fs::write(&path, "lat,lon\n1,2\n").unwrap();

    let err = read_collection(&path, scratch.path(), None).unwrap_err();
    assert!(matches!(err, ConvertError::FormatError { .. }));
}

#[test]
fn zip_without_shp_payload_is_missing_payload() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle.zip");

    let file = fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file("readme.txt", zip::write::SimpleFileOptions::default()).unwrap();
    zip.write_all(b"no shapefile here").unwrap();
    zip.finish().unwrap();

    let err = read_collection(&path, scratch.path(), None).unwrap_err();
    assert!(matches!(err, ConvertError::MissingPayload { .. }));
}

#[test]
fn corrupt_zip_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.zip");
    fs::write(&path, b"PK but not really").unwrap();

    let err = read_collection(&path, scratch.path(), None).unwrap_err();
    assert!(matches!(err, ConvertError::UnreadableSource { .. }));
}

#[test]
fn unknown_extension_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("raster.tiff");
    fs::write(&path, b"II*\0").unwrap();

    let err = read_collection(&path, scratch.path(), None).unwrap_err();
    match err {
        ConvertError::UnreadableSource { reason, .. } => {
            assert!(reason.contains("unsupported input extension"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn gml_features_with_srs() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let path = dir.path().join("roads.gml");
    fs::write(
        &path,
        r#"<?xml version="1.0"?>
<gml:FeatureCollection xmlns:gml="http://www.opengis.net/gml">
  <gml:featureMember>
    <gml:LineString srsName="urn:ogc:def:crs:EPSG::3857">
      <gml:posList>0 0 1000 1000 2000 1500</gml:posList>
    </gml:LineString>
  </gml:featureMember>
</gml:FeatureCollection>"#,
    )
    .unwrap();

    let collection = read_collection(&path, scratch.path(), None).unwrap();
    assert_eq!(collection.crs, Some(3857));
    assert_eq!(collection.len(), 1);
    match &collection.features[0].geometry {
        Some(geo::Geometry::LineString(line)) => assert_eq!(line.0.len(), 3),
        other => panic!("expected line, got {other:?}"),
    }
}
