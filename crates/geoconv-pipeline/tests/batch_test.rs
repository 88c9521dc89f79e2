//! End-to-end batch pipeline over a mixed directory.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use geoconv_core::registry::OutputFormat;
use geoconv_geo::ConditionOptions;
use geoconv_pipeline::{run_batch, scan_directory, ConvertOptions, ReportLog};

fn write_geojson_point(dir: &Path, name: &str, x: f64, y: f64) {
    fs::write(
        dir.join(name),
        format!(
            r#"{{"type": "FeatureCollection", "features": [
                {{"type": "Feature",
                 "geometry": {{"type": "Point", "coordinates": [{x}, {y}]}},
                 "properties": {{"name": "{name}"}}}}
            ]}}"#
        ),
    )
    .unwrap();
}

fn write_kml_point(dir: &Path, name: &str) {
    fs::write(
        dir.join(name),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>poi</name>
      <Point><coordinates>77.6,12.9,0</coordinates></Point>
    </Placemark>
  </Document>
</kml>"#,
    )
    .unwrap();
}

#[test]
fn mixed_directory_batch_to_geopackage() {
    let dir = tempfile::tempdir().unwrap();
    write_geojson_point(dir.path(), "a.geojson", 77.6, 12.9);
    write_kml_point(dir.path(), "b.kml");
    fs::write(dir.path().join("c.csv"), "lat,lon\n1,2\n").unwrap();
    fs::write(dir.path().join("d.geojson"), "broken").unwrap();
    fs::write(dir.path().join("ignored.txt"), "not geodata").unwrap();

    let inputs = scan_directory(dir.path()).unwrap();
    assert_eq!(inputs.len(), 4);

    let options = ConvertOptions {
        output_format: OutputFormat::Gpkg,
        target_epsg: Some("3857".to_string()),
        ..Default::default()
    };
    let result = run_batch(&inputs, &options).unwrap();

    // Four inputs: two converted, one tabular skip, one parse failure.
    assert_eq!(result.reports.len(), 4);
    assert_eq!(result.produced, 2);
    assert_eq!(result.failed(), 2);

    let mut zip = zip::ZipArchive::new(Cursor::new(result.archive)).unwrap();
    let names: Vec<String> =
        (0..zip.len()).map(|i| zip.by_index(i).unwrap().name().to_string()).collect();
    assert!(names.contains(&"a.gpkg".to_string()));
    assert!(names.contains(&"b.gpkg".to_string()));
    for stem in ["a", "b", "c", "d"] {
        assert!(
            names.contains(&format!("{stem}_report.txt")),
            "missing report for {stem} in {names:?}"
        );
    }

    let successful: Vec<_> = result.reports.iter().filter(|r| r.succeeded).collect();
    assert!(successful
        .iter()
        .all(|r| r.lines.contains(&"Reprojected to EPSG:3857.".to_string())));
}

#[test]
fn conditioning_notes_survive_into_batch_reports() {
    let dir = tempfile::tempdir().unwrap();
    // Degenerate two-point ring: unrepairable, and the drop must show up in
    // the report.
    fs::write(
        dir.path().join("zone.geojson"),
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature",
             "geometry": {"type": "Polygon",
                          "coordinates": [[[0,0],[4,0]]]},
             "properties": {}}
        ]}"#,
    )
    .unwrap();

    let options = ConvertOptions {
        condition: ConditionOptions::default(),
        ..Default::default()
    };
    let result = run_batch(&scan_directory(dir.path()).unwrap(), &options).unwrap();

    assert_eq!(result.produced, 1);
    assert!(result.reports[0].lines.iter().any(|n| n.contains("Dropped 1")));
}

#[test]
fn report_log_archives_the_window() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..7 {
        write_geojson_point(dir.path(), &format!("f{i}.geojson"), i as f64, i as f64);
    }

    let result =
        run_batch(&scan_directory(dir.path()).unwrap(), &ConvertOptions::default()).unwrap();
    assert_eq!(result.produced, 7);

    // Default window keeps only the five most recent reports.
    let mut log = ReportLog::new();
    for report in result.reports {
        log.push(report);
    }
    assert_eq!(log.len(), 5);

    let archive = log.archive().unwrap();
    let zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 5);
}
