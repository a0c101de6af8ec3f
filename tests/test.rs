use launchsites::{
    filter_unassigned, load, ClusterList, ClusterParams, Geo, LaunchSiteError, LoadOptions,
    OutputFormat, Report, ReportOptions, ScoreParams,
};
use serde_json::Value;
use std::{fs, io::Read, path::Path};

/*-------------------------------------------------------------------------------------------------
 *
 *                                         Helpers
 *
 *-----------------------------------------------------------------------------------------------*/
fn export_line(id: &str, serial: &str, lat: f64, lon: f64, launch_site: Option<&str>) -> String {
    let site = match launch_site {
        Some(site) => format!(r#","launch_site":"{}""#, site),
        None => String::new(),
    };

    format!(
        concat!(
            r#"{{"_index":"predictions","_id":"{}","_source":{{"serial":"{}","type":"RS41","#,
            r#""subtype":"RS41-SG"{},"data":[{{"lat":-30.0,"lon":140.0,"alt":25000.0,"#,
            r#""time":1680000000}},{{"lat":{},"lon":{},"alt":90.0,"time":1680007200}}]}}}}"#
        ),
        id, serial, site, lat, lon
    )
}

fn run_pipeline(input: &Path, threshold_m: f64) -> Report {
    let (points, summary) = load(input, &LoadOptions::default()).unwrap();
    let params = ClusterParams::new(threshold_m).unwrap();
    let clusters = ClusterList::from_predictions(points, params);

    Report::new(
        clusters,
        summary,
        &ScoreParams::new(threshold_m).unwrap(),
        &ReportOptions::default(),
    )
}

fn kind(err: &Box<dyn std::error::Error>) -> &LaunchSiteError {
    err.downcast_ref::<LaunchSiteError>().unwrap()
}

/*-------------------------------------------------------------------------------------------------
 *
 *                                          Tests
 *
 *-----------------------------------------------------------------------------------------------*/
#[test]
fn test_two_site_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    fs::write(
        &input,
        r#"[
            {"latitude": 10.0, "longitude": 10.0},
            {"latitude": 10.0005, "longitude": 10.0005},
            {"latitude": 50.0, "longitude": 50.0}
        ]"#,
    )
    .unwrap();

    let report = run_pipeline(&input, 100.0);

    assert_eq!(report.summary().clusters_found, 2);
    assert_eq!(report.sites().len(), 2);
    assert_eq!(report.sites()[0].count(), 2);
    assert!((report.sites()[0].centroid().lat - 10.0).abs() < 0.001);
    assert_eq!(report.sites()[1].count(), 1);
    assert_eq!(report.sites()[1].centroid().lat, 50.0);

    let output = dir.path().join("sites.json");
    report.save(OutputFormat::Json, Some(&output)).unwrap();

    let value: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["summary"]["points_processed"], 3);
    assert_eq!(value["summary"]["points_skipped"], 0);
    assert_eq!(value["sites"].as_array().unwrap().len(), 2);
}

#[test]
fn test_empty_export() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    fs::write(&input, "[]").unwrap();

    let report = run_pipeline(&input, 300.0);
    assert_eq!(report.summary().clusters_found, 0);
    assert_eq!(report.summary().points_processed, 0);
    assert!(report.sites().is_empty());

    let output = dir.path().join("sites.csv");
    report.save(OutputFormat::Csv, Some(&output)).unwrap();
    assert_eq!(fs::read_to_string(&output).unwrap().lines().count(), 1);
}

#[test]
fn test_missing_longitude() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.ndjson");

    let mut text = String::new();
    for i in 0..10 {
        if i == 6 {
            text.push_str(r#"{"latitude": 33.3}"#);
        } else {
            text.push_str(&format!(
                r#"{{"latitude": {}, "longitude": -97.0}}"#,
                30.0 + i as f64
            ));
        }
        text.push('\n');
    }
    fs::write(&input, text).unwrap();

    let (points, summary) = load(&input, &LoadOptions::default()).unwrap();
    assert_eq!(points.len(), 9);
    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.records, 10);

    let report = run_pipeline(&input, 300.0);
    assert_eq!(report.summary().points_skipped, 1);
    assert_eq!(report.summary().clusters_found, 9);
}

#[test]
fn test_directory_of_shards() {
    let dir = tempfile::tempdir().unwrap();
    let shards = dir.path().join("dump");
    fs::create_dir_all(shards.join("part2")).unwrap();

    let first: Vec<String> = (0..4)
        .map(|i| export_line(&i.to_string(), &format!("T{}", i), -35.1, 138.5, None))
        .collect();
    fs::write(shards.join("part1.ndjson"), first.join("\n")).unwrap();

    let second: Vec<String> = vec![
        export_line("10", "T0", -35.1, 138.5, None),
        export_line("11", "T11", -35.1001, 138.5001, None),
        export_line("12", "T12", -35.1, 138.5, Some("Adelaide")),
        export_line("13", "T13", 51.0, -1.0, None),
    ];
    fs::write(shards.join("part2").join("more.json"), second.join("\n")).unwrap();
    fs::write(shards.join("README.txt"), "not an export").unwrap();

    let (points, summary) = load(&shards, &LoadOptions::default()).unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.records, 8);
    assert_eq!(summary.duplicate, 1);
    assert_eq!(summary.known_site, 1);
    assert_eq!(points.len(), 6);

    let report = run_pipeline(&shards, 300.0);
    assert_eq!(report.sites().len(), 2);
    assert_eq!(report.sites()[0].count(), 5);
    assert_eq!(report.sites()[0].rank(), 1);
}

#[test]
fn test_missing_input_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nope.json");

    let err = load(&input, &LoadOptions::default()).unwrap_err();
    assert!(kind(&err).is_io());
    assert!(err.to_string().contains("nope.json"));
}

#[test]
fn test_all_invalid_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.ndjson");
    fs::write(&input, "{\"lat\": 100.0, \"lon\": 0.0}\nnot json\n").unwrap();

    let err = load(&input, &LoadOptions::default()).unwrap_err();
    assert!(kind(&err).is_data_format());
}

#[test]
fn test_unwritable_output_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    fs::write(&input, r#"[{"latitude": 1.0, "longitude": 1.0}]"#).unwrap();

    let report = run_pipeline(&input, 300.0);
    let output = dir.path().join("missing_dir").join("sites.csv");

    let err = report.save(OutputFormat::Csv, Some(&output)).unwrap_err();
    assert!(kind(&err).is_io());
}

#[test]
fn test_kmz_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    fs::write(
        &input,
        r#"[
            {"latitude": 47.46, "longitude": -111.38, "timestamp": "2023-03-28T12:00:00Z"},
            {"latitude": 47.4601, "longitude": -111.3801, "timestamp": "2023-03-29T00:00:00Z"}
        ]"#,
    )
    .unwrap();

    let report = run_pipeline(&input, 300.0);
    let output = dir.path().join("sites.kmz");
    report.save(OutputFormat::Kmz, Some(&output)).unwrap();

    let mut archive = zip::ZipArchive::new(fs::File::open(&output).unwrap()).unwrap();
    let mut doc = String::new();
    archive
        .by_name("doc.kml")
        .unwrap()
        .read_to_string(&mut doc)
        .unwrap();

    assert!(doc.contains("<name>#1</name>"));
    assert!(doc.contains("<begin>2023-03-28T12:00:00.000Z</begin>"));
    assert!(doc.contains("<end>2023-03-29T00:00:00.000Z</end>"));
    assert!(doc.ends_with("</kml>\n"));
}

#[test]
fn test_geojson_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("export.json");
    fs::write(
        &input,
        r#"[{"latitude": 1.0, "longitude": 2.0}, {"latitude": 1.0001, "longitude": 2.0}]"#,
    )
    .unwrap();

    let report = run_pipeline(&input, 300.0);
    let output = dir.path().join("sites.geojson");
    report.save(OutputFormat::GeoJson, Some(&output)).unwrap();

    let value: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(value["features"].as_array().unwrap().len(), 2);
}

#[test]
fn test_filter_unassigned() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("raw.json");
    let output = dir.path().join("filtered.json");

    let lines = vec![
        export_line("1", "A", 1.0, 1.0, None),
        export_line("2", "B", 1.0, 1.0, Some("-1")),
        "garbage".to_owned(),
        export_line("3", "C", 1.0, 1.0, None),
    ];
    fs::write(&input, lines.join("\n")).unwrap();

    let (kept, read) = filter_unassigned(&input, &output).unwrap();
    assert_eq!(kept, 2);
    assert_eq!(read, 4);

    let filtered = fs::read_to_string(&output).unwrap();
    let filtered: Vec<&str> = filtered.lines().collect();
    assert_eq!(filtered, vec![lines[0].as_str(), lines[3].as_str()]);

    // The filtered file loads with nothing filtered out as a known site.
    let (points, summary) = load(&output, &LoadOptions::default()).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(summary.known_site, 0);
}
