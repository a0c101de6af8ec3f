/*!
 * Read prediction records exported from the search cluster.
 *
 * The export tool writes either a JSON array, newline delimited JSON (one record per line), or the
 * raw body of a search response. Large exports are often split into several files, so a directory
 * can be loaded too.
 *
 * Two record layouts are understood. A flat record has `latitude` and `longitude` (or `lat` and
 * `lon`) at the top level. An export hit looks like
 * `{"_id": .., "_source": {"serial": .., "data": [{"lat": .., "lon": .., "alt": .., "time": ..}]}}`
 * and the last element of `data` is the predicted launch point.
 */

use crate::{
    error::LaunchSiteError,
    geo::BoundingBox,
    prediction::{PredictionList, PredictionPoint},
    LaunchSiteResult,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rustc_hash::FxHashSet as HashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fmt::{self, Display},
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/*-------------------------------------------------------------------------------------------------
 *                                     Options and Summary
 *-----------------------------------------------------------------------------------------------*/

/// Filters applied while loading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Only keep points inside this box.
    pub bbox: Option<BoundingBox>,
    /// Keep records that already have a launch site assigned.
    pub include_known_sites: bool,
    /// Keep every record from a sonde, not just the first one seen.
    pub keep_duplicates: bool,
}

/// Counts of what happened to the records while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// Number of files read.
    pub files: usize,
    /// Number of records seen, valid or not.
    pub records: usize,
    /// Number of points kept.
    pub loaded: usize,
    /// Records skipped because they were malformed or had bad coordinates.
    pub invalid: usize,
    /// Records skipped because they already have a launch site.
    pub known_site: usize,
    /// Records skipped because a record for the same sonde was already loaded.
    pub duplicate: usize,
    /// Records skipped because they were outside the bounding box.
    pub outside_bbox: usize,
}

impl Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            concat!(
                "{} records from {} files: {} loaded, {} invalid, ",
                "{} with known sites, {} duplicates, {} outside the bounding box"
            ),
            self.records,
            self.files,
            self.loaded,
            self.invalid,
            self.known_site,
            self.duplicate,
            self.outside_bbox
        )
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                       Record Layouts
 *-----------------------------------------------------------------------------------------------*/

// Only the coordinates are strictly typed. Everything else is read as a raw value and converted
// leniently, a field of the wrong type is dropped instead of the whole record.

#[derive(Debug, Deserialize)]
struct FlatRecord {
    #[serde(alias = "lat")]
    latitude: Option<f64>,
    #[serde(alias = "lon")]
    longitude: Option<f64>,
    #[serde(alias = "time", alias = "datetime")]
    timestamp: Option<Value>,
    serial: Option<Value>,
    id: Option<Value>,
    #[serde(alias = "alt")]
    altitude: Option<Value>,
    #[serde(rename = "type")]
    sonde_type: Option<Value>,
    launch_site: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ExportHit {
    #[serde(rename = "_id")]
    id: Option<Value>,
    #[serde(rename = "_source")]
    source: ExportSource,
}

#[derive(Debug, Deserialize)]
struct ExportSource {
    serial: Option<Value>,
    #[serde(rename = "type")]
    sonde_type: Option<Value>,
    subtype: Option<Value>,
    launch_site: Option<Value>,
    #[serde(default)]
    data: Vec<ExportStep>,
}

#[derive(Debug, Deserialize)]
struct ExportStep {
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<Value>,
    time: Option<Value>,
}

/// A parsed record before filtering.
struct Record {
    point: PredictionPoint,
    known_site: bool,
}

fn parse_record(value: Value) -> LaunchSiteResult<Record> {
    if value.get("_source").is_some() {
        parse_export_hit(value)
    } else {
        parse_flat_record(value)
    }
}

fn parse_export_hit(value: Value) -> LaunchSiteResult<Record> {
    let ExportHit { id, source } = serde_json::from_value(value)
        .map_err(|err| LaunchSiteError::data_format(format!("bad export record: {}", err)))?;

    let ExportSource {
        serial,
        sonde_type,
        subtype,
        launch_site,
        mut data,
    } = source;

    let step = data
        .pop()
        .ok_or_else(|| LaunchSiteError::data_format("record has no prediction data"))?;

    let lat = step
        .lat
        .ok_or_else(|| LaunchSiteError::data_format("missing latitude"))?;
    let lon = step
        .lon
        .ok_or_else(|| LaunchSiteError::data_format("missing longitude"))?;

    let point = PredictionPoint::new(lat, lon)?
        .with_id(to_text(id, "_id"))
        .with_serial(to_text(serial, "serial"))
        .with_altitude(to_number(step.alt, "alt"))
        .with_time(step.time.and_then(to_datetime))
        .with_sonde_type(to_text(subtype, "subtype").or_else(|| to_text(sonde_type, "type")));

    Ok(Record {
        point,
        known_site: has_value(&launch_site),
    })
}

fn parse_flat_record(value: Value) -> LaunchSiteResult<Record> {
    let FlatRecord {
        latitude,
        longitude,
        timestamp,
        serial,
        id,
        altitude,
        sonde_type,
        launch_site,
    } = serde_json::from_value(value)
        .map_err(|err| LaunchSiteError::data_format(format!("bad record: {}", err)))?;

    let lat = latitude.ok_or_else(|| LaunchSiteError::data_format("missing latitude"))?;
    let lon = longitude.ok_or_else(|| LaunchSiteError::data_format("missing longitude"))?;

    let point = PredictionPoint::new(lat, lon)?
        .with_id(to_text(id, "id"))
        .with_serial(to_text(serial, "serial"))
        .with_altitude(to_number(altitude, "altitude"))
        .with_time(timestamp.and_then(to_datetime))
        .with_sonde_type(to_text(sonde_type, "type"));

    Ok(Record {
        point,
        known_site: has_value(&launch_site),
    })
}

fn has_value(value: &Option<Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

/// Strings are taken as they are and numbers are written out, anything else is dropped.
fn to_text(raw: Option<Value>, field: &str) -> Option<String> {
    match raw? {
        Value::String(text) => Some(text),
        Value::Number(num) => Some(num.to_string()),
        Value::Null => None,
        other => {
            log::debug!("Ignoring {} that is not text: {}", field, other);
            None
        }
    }
}

/// Numbers, or strings holding a number. Anything else is dropped.
fn to_number(raw: Option<Value>, field: &str) -> Option<f64> {
    let parsed = match raw? {
        Value::Number(num) => num.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Null => return None,
        _ => None,
    };

    match parsed {
        Some(num) if num.is_finite() => Some(num),
        _ => {
            log::debug!("Ignoring {} that is not a number", field);
            None
        }
    }
}

/// Timestamps are optional, so one that can't be understood is dropped rather than the record.
///
/// Numbers are seconds since the Unix epoch. Strings are RFC 3339 or `YYYY-MM-DD HH:MM:SS` in UTC.
fn to_datetime(raw: Value) -> Option<DateTime<Utc>> {
    let parsed = match &raw {
        Value::Number(num) => num.as_f64().filter(|secs| secs.is_finite()).and_then(|secs| {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1.0e9) as u32;
            Utc.timestamp_opt(whole as i64, nanos).single()
        }),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Null => return None,
        _ => None,
    };

    if parsed.is_none() {
        log::debug!("Ignoring unreadable timestamp: {}", raw);
    }

    parsed
}

/*-------------------------------------------------------------------------------------------------
 *                                           Loader
 *-----------------------------------------------------------------------------------------------*/

/// Accumulates points from one or more export files.
#[derive(Debug)]
pub struct Loader {
    opts: LoadOptions,
    summary: LoadSummary,
    seen_serials: HashSet<String>,
    points: PredictionList,
}

impl Loader {
    pub fn new(opts: LoadOptions) -> Self {
        Loader {
            opts,
            summary: LoadSummary::default(),
            seen_serials: HashSet::default(),
            points: PredictionList::new(),
        }
    }

    /// Load a single export file, or every export file in a directory tree.
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> LaunchSiteResult<()> {
        let path = path.as_ref();

        let metadata = std::fs::metadata(path).map_err(|err| LaunchSiteError::io(path, err))?;

        if !metadata.is_dir() {
            return self.load_file(path);
        }

        let mut files: Vec<PathBuf> = vec![];
        for entry in walkdir::WalkDir::new(path) {
            // A part of the export that can't be read would silently shrink the data set.
            let entry = entry.map_err(|err| {
                let pth = err.path().unwrap_or(path).to_path_buf();
                LaunchSiteError::io(pth, err.into())
            })?;

            // Ignore directories, WalkDir will take care of recursing into them.
            if entry.path().is_file() && is_export_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        if files.is_empty() {
            log::warn!("No export files found in {}", path.display());
        }

        for file in &files {
            self.load_file(file)?;
        }

        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> LaunchSiteResult<()> {
        let text = std::fs::read_to_string(path).map_err(|err| LaunchSiteError::io(path, err))?;

        let records_before = self.summary.records;
        self.load_str(&text).map_err(|err| -> Box<dyn std::error::Error> {
            match err.downcast::<LaunchSiteError>() {
                Ok(err) => match *err {
                    LaunchSiteError::DataFormat { reason } => LaunchSiteError::data_format(
                        format!("{}: {}", path.display(), reason),
                    )
                    .into(),
                    other => other.into(),
                },
                Err(err) => err,
            }
        })?;
        self.summary.files += 1;

        log::info!(
            "Read {} records from {}",
            self.summary.records - records_before,
            path.display()
        );

        Ok(())
    }

    /// Load one document held in memory.
    pub fn load_str(&mut self, text: &str) -> LaunchSiteResult<()> {
        let text = text.trim();

        match text.as_bytes().first() {
            None => {}
            Some(b'[') => {
                let records: Vec<Value> = serde_json::from_str(text).map_err(|err| {
                    LaunchSiteError::data_format(format!("malformed JSON array: {}", err))
                })?;

                for value in records {
                    self.add_value(value);
                }
            }
            Some(b'{') => match serde_json::from_str::<Value>(text) {
                // One object for the whole document, a search response or a single record.
                Ok(mut value) => match value.pointer_mut("/hits/hits").map(Value::take) {
                    Some(Value::Array(hits)) => {
                        for hit in hits {
                            self.add_value(hit);
                        }
                    }
                    Some(_) => {
                        return Err(LaunchSiteError::data_format(
                            "search response hits.hits is not an array",
                        )
                        .into())
                    }
                    None => self.add_value(value),
                },
                Err(_) => self.load_lines(text),
            },
            Some(_) => self.load_lines(text),
        }

        Ok(())
    }

    fn load_lines(&mut self, text: &str) {
        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(value) => self.add_value(value),
                Err(err) => {
                    self.summary.records += 1;
                    self.summary.invalid += 1;
                    log::debug!("Skipping line {}: not JSON: {}", line_num + 1, err);
                }
            }
        }
    }

    fn add_value(&mut self, value: Value) {
        self.summary.records += 1;

        let Record { point, known_site } = match parse_record(value) {
            Ok(record) => record,
            Err(err) => {
                self.summary.invalid += 1;
                log::debug!("Skipping record {}: {}", self.summary.records, err);
                return;
            }
        };

        if known_site && !self.opts.include_known_sites {
            self.summary.known_site += 1;
            return;
        }

        if let Some(bbox) = self.opts.bbox {
            if !bbox.contains(point.coord()) {
                self.summary.outside_bbox += 1;
                return;
            }
        }

        if !self.opts.keep_duplicates {
            if let Some(serial) = point.serial() {
                if !self.seen_serials.insert(serial.to_owned()) {
                    self.summary.duplicate += 1;
                    return;
                }
            }
        }

        self.points.push(point);
        self.summary.loaded += 1;
    }

    /// The counts so far.
    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Finish loading.
    ///
    /// It is an error if there were records and every single one of them was invalid.
    pub fn finish(self) -> LaunchSiteResult<(PredictionList, LoadSummary)> {
        let Loader {
            summary, points, ..
        } = self;

        if summary.records > 0 && summary.invalid == summary.records {
            return Err(LaunchSiteError::data_format(format!(
                "all {} records were invalid",
                summary.records
            ))
            .into());
        }

        log::info!("{}", summary);
        if summary.loaded == 0 && summary.records > 0 {
            log::warn!("Every record was filtered out, nothing to cluster.");
        }

        Ok((points, summary))
    }
}

/// Load the export at `path`, a file or a directory, with the given filters.
pub fn load<P: AsRef<Path>>(
    path: P,
    opts: &LoadOptions,
) -> LaunchSiteResult<(PredictionList, LoadSummary)> {
    let mut loader = Loader::new(opts.clone());
    loader.load_path(path)?;
    loader.finish()
}

fn is_export_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("json") | Some("ndjson") | Some("jsonl")
    )
}

/*-------------------------------------------------------------------------------------------------
 *                                    Export Pre-filtering
 *-----------------------------------------------------------------------------------------------*/

/**
 * Copy the records of a newline delimited export that do not have a launch site yet.
 *
 * Lines are copied unchanged. Lines that are not JSON are dropped.
 *
 * #Returns
 * The number of lines kept and the number of lines read.
 */
pub fn filter_unassigned<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> LaunchSiteResult<(usize, usize)> {
    let input = input.as_ref();
    let output = output.as_ref();

    let reader = File::open(input)
        .map(BufReader::new)
        .map_err(|err| LaunchSiteError::io(input, err))?;
    let mut writer = File::create(output)
        .map(BufWriter::new)
        .map_err(|err| LaunchSiteError::io(output, err))?;

    let mut kept = 0;
    let mut read = 0;
    for line in reader.lines() {
        let line = line.map_err(|err| LaunchSiteError::io(input, err))?;
        if line.trim().is_empty() {
            continue;
        }
        read += 1;

        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                log::debug!("Dropping line {}: not JSON: {}", read, err);
                continue;
            }
        };

        let launch_site = value
            .pointer("/_source/launch_site")
            .or_else(|| value.get("launch_site"));
        if matches!(launch_site, None | Some(Value::Null)) {
            writeln!(writer, "{}", line).map_err(|err| LaunchSiteError::io(output, err))?;
            kept += 1;
        }
    }

    writer
        .flush()
        .map_err(|err| LaunchSiteError::io(output, err))?;

    Ok((kept, read))
}
