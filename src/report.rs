/*!
 * Produce the ranked list of candidate launch sites.
 *
 * The report can be written as JSON, CSV, GeoJSON, KML or KMZ. None of these draw a map, they are
 * meant to be opened in a mapping tool.
 */

use crate::{
    cluster::ClusterList,
    error::{self, LaunchSiteError},
    geo::{BoundingBox, Geo},
    kml::{KmlFile, KmlWriter, KmzFile},
    loader::LoadSummary,
    prediction::PredictionPoint,
    site::{CandidateSite, ScoreParams},
    LaunchSiteResult,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::{
    fmt::Write as FmtWrite,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};
use strum::{Display, EnumIter, EnumString};

/*-------------------------------------------------------------------------------------------------
 *                                       Output Formats
 *-----------------------------------------------------------------------------------------------*/

/// The file formats a report can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    Json,
    Csv,
    GeoJson,
    Kml,
    Kmz,
}

impl OutputFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        OutputFormat::from_str(ext).ok()
    }

    /// Can this format be written to standard output?
    pub fn is_streamable(&self) -> bool {
        !matches!(self, OutputFormat::Kmz)
    }
}

/// Options controlling which sites are reported.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Sites with fewer members than this are left out.
    pub min_members: usize,
    /// Only report this many of the best sites.
    pub top: Option<usize>,
    /// Include the individual predictions in the output.
    pub include_members: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            min_members: 1,
            top: None,
            include_members: false,
        }
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                           Report
 *-----------------------------------------------------------------------------------------------*/

/// Totals for a run, from loading through ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub load: LoadSummary,
    /// The clustering distance in meters.
    pub threshold_m: f64,
    /// Points that went into the clustering.
    pub points_processed: usize,
    /// Records the loader could not use.
    pub points_skipped: usize,
    /// Clusters found before any were left out of the report.
    pub clusters_found: usize,
    /// Sites in the report.
    pub sites_reported: usize,
}

/// The ranked candidate sites and the summary of how they were found.
#[derive(Debug)]
pub struct Report {
    summary: RunSummary,
    sites: Vec<CandidateSite>,
    include_members: bool,
}

impl Report {
    /// Score and rank the clusters.
    pub fn new(
        clusters: ClusterList,
        load: LoadSummary,
        score: &ScoreParams,
        opts: &ReportOptions,
    ) -> Self {
        let ClusterList {
            params,
            num_points,
            clusters,
        } = clusters;

        let clusters_found = clusters.len();
        let clusters = clusters
            .into_iter()
            .filter(|c| c.count() >= opts.min_members)
            .collect();

        let mut sites = CandidateSite::rank_clusters(clusters, score);
        if let Some(top) = opts.top {
            sites.truncate(top);
        }

        let summary = RunSummary {
            load,
            threshold_m: params.threshold_m(),
            points_processed: num_points,
            points_skipped: load.invalid,
            clusters_found,
            sites_reported: sites.len(),
        };

        Report {
            summary,
            sites,
            include_members: opts.include_members,
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// The sites, best first.
    pub fn sites(&self) -> &[CandidateSite] {
        &self.sites
    }

    /// Log the summary and the best few sites.
    pub fn log_summary(&self) {
        const NUM_TO_LOG: usize = 5;

        let RunSummary {
            points_processed,
            points_skipped,
            clusters_found,
            sites_reported,
            ..
        } = self.summary;

        log::info!("");
        log::info!("  points processed - {:>12}", points_processed);
        log::info!("    points skipped - {:>12}", points_skipped);
        log::info!("    clusters found - {:>12}", clusters_found);
        log::info!("    sites reported - {:>12}", sites_reported);
        log::info!("");

        if self.sites.is_empty() {
            log::warn!("No candidate launch sites found!");
            return;
        }

        for site in self.sites.iter().take(NUM_TO_LOG) {
            let centroid = site.centroid();
            log::info!(
                "#{:<3} {:>11.6} {:>12.6}  members {:>5}  spread {:>7.1} m  confidence {:>8.2}",
                site.rank(),
                centroid.lat,
                centroid.lon,
                site.count(),
                site.spread_m(),
                site.confidence()
            );
        }
        log::info!("");
    }

    /// Write the report in `format` to `path`, or to standard output when there is no path.
    ///
    /// Any failure while writing is an I/O error naming the output.
    pub fn save(&self, format: OutputFormat, path: Option<&Path>) -> LaunchSiteResult<()> {
        match path {
            Some(path) => self
                .save_file(format, path)
                .map_err(|err| error::with_path(path, err)),
            None => self
                .save_stdout(format)
                .map_err(|err| error::with_path(Path::new("standard output"), err)),
        }
    }

    fn save_file(&self, format: OutputFormat, path: &Path) -> LaunchSiteResult<()> {
        match format {
            OutputFormat::Kmz => {
                let mut kmz = KmzFile::new(path)?;
                self.write_kml(&mut kmz)?;
                kmz.finish()
            }
            OutputFormat::Kml => {
                let mut kml = KmlFile::new(path)?;
                self.write_kml(&mut kml)?;
                kml.finish()
            }
            format => {
                let f = File::create(path).map_err(|err| LaunchSiteError::io(path, err))?;
                let mut writer = BufWriter::new(f);
                self.write(format, &mut writer)?;
                writer.flush()?;
                Ok(())
            }
        }
    }

    fn save_stdout(&self, format: OutputFormat) -> LaunchSiteResult<()> {
        if !format.is_streamable() {
            return Err(LaunchSiteError::config(format!(
                "{} output needs an output file",
                format
            ))
            .into());
        }

        let mut stdout = std::io::stdout().lock();
        self.write(format, &mut stdout)?;
        stdout.flush()?;
        Ok(())
    }

    /// Write one of the text formats to any output.
    pub fn write<W: Write>(&self, format: OutputFormat, writer: W) -> LaunchSiteResult<()> {
        match format {
            OutputFormat::Json => self.write_json(writer),
            OutputFormat::Csv => self.write_csv(writer),
            OutputFormat::GeoJson => self.write_geojson(writer),
            OutputFormat::Kml => {
                let mut kml = KmlFile::from_writer(writer)?;
                self.write_kml(&mut kml)?;
                kml.finish()
            }
            OutputFormat::Kmz => {
                Err(LaunchSiteError::config("KMZ can only be written to a file").into())
            }
        }
    }

    /// Write the summary and the sites as a JSON object.
    pub fn write_json<W: Write>(&self, mut writer: W) -> LaunchSiteResult<()> {
        #[derive(Serialize)]
        struct JsonSite<'a> {
            #[serde(flatten)]
            row: SiteRow,
            #[serde(skip_serializing_if = "Option::is_none")]
            predictions: Option<Vec<MemberRow<'a>>>,
        }

        #[derive(Serialize)]
        struct JsonReport<'a> {
            summary: &'a RunSummary,
            sites: Vec<JsonSite<'a>>,
        }

        let sites = self
            .sites
            .iter()
            .map(|site| JsonSite {
                row: SiteRow::from(site),
                predictions: if self.include_members {
                    Some(site.members().iter().map(MemberRow::from).collect())
                } else {
                    None
                },
            })
            .collect();

        let report = JsonReport {
            summary: &self.summary,
            sites,
        };

        serde_json::to_writer_pretty(&mut writer, &report)?;
        writeln!(writer)?;

        Ok(())
    }

    /// Write one row per site. The header is always written, even with no sites.
    pub fn write_csv<W: Write>(&self, writer: W) -> LaunchSiteResult<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);

        wtr.write_record(SiteRow::COLUMNS)?;
        for site in &self.sites {
            wtr.serialize(SiteRow::from(site))?;
        }
        wtr.flush()?;

        Ok(())
    }

    /// Write a GeoJSON FeatureCollection.
    ///
    /// Each site is a Point at its centroid. Sites with more than one prediction also get a
    /// Polygon around their predictions, and the predictions themselves are added when the report
    /// includes members.
    pub fn write_geojson<W: Write>(&self, mut writer: W) -> LaunchSiteResult<()> {
        let mut features: Vec<Value> = vec![];

        for site in &self.sites {
            let row = SiteRow::from(site);

            features.push(json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [row.longitude, row.latitude]
                },
                "properties": &row
            }));

            if site.count() > 1 {
                let BoundingBox { ll, ur } = site.bounding_box();
                features.push(json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [ll.lon, ll.lat],
                            [ll.lon, ur.lat],
                            [ur.lon, ur.lat],
                            [ur.lon, ll.lat],
                            [ll.lon, ll.lat]
                        ]]
                    },
                    "properties": {
                        "rank": row.rank,
                        "members": row.members
                    }
                }));
            }

            if self.include_members {
                for pnt in site.members() {
                    let member = MemberRow::from(pnt);
                    features.push(json!({
                        "type": "Feature",
                        "geometry": {
                            "type": "Point",
                            "coordinates": [pnt.lon(), pnt.lat()]
                        },
                        "properties": {
                            "rank": row.rank,
                            "id": member.id,
                            "serial": member.serial,
                            "type": member.sonde_type,
                            "datetime": pnt.time().map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
                            "alt": member.alt
                        }
                    }));
                }
            }
        }

        let collection = json!({
            "type": "FeatureCollection",
            "features": features
        });

        serde_json::to_writer(&mut writer, &collection)?;
        writeln!(writer)?;

        Ok(())
    }

    /// Write the sites into a KML document.
    pub fn write_kml<K: KmlWriter>(&self, kml: &mut K) -> LaunchSiteResult<()> {
        kml.start_style(Some("site"))?;
        kml.create_icon_style(
            Some("http://maps.google.com/mapfiles/kml/shapes/target.png"),
            1.0,
        )?;
        kml.create_poly_style(Some("4000FFFF"), true, true)?;
        kml.finish_style()?;

        kml.start_style(Some("prediction"))?;
        kml.create_icon_style(
            Some("http://maps.google.com/mapfiles/kml/shapes/placemark_circle.png"),
            0.5,
        )?;
        kml.finish_style()?;

        kml.start_folder(Some("Candidate launch sites"), None, true)?;

        let mut name = String::with_capacity(16);
        let mut description = String::with_capacity(256);
        for site in &self.sites {
            let centroid = site.centroid();

            name.clear();
            let _ = write!(&mut name, "#{}", site.rank());

            description.clear();
            let _ = write!(
                &mut description,
                concat!(
                    "<h3>Rank: {}</h3>",
                    "<h3>Predictions: {}</h3>",
                    "<h3>Spread: {:.0} m</h3>",
                    "<h3>Confidence: {:.2}</h3>",
                    "<h3>Centroid: {:.6}, {:.6}</h3>",
                ),
                site.rank(),
                site.count(),
                site.spread_m(),
                site.confidence(),
                centroid.lat,
                centroid.lon,
            );

            kml.start_folder(Some(&name), None, false)?;

            if let (Some(start), Some(end)) = (site.first_seen(), site.last_seen()) {
                kml.timespan(start, end)?;
            }

            kml.start_placemark(Some(&name), Some(&description), Some("#site"))?;
            if site.count() > 1 {
                let BoundingBox { ll, ur } = site.bounding_box();

                kml.start_multi_geometry()?;
                kml.create_point(centroid.lat, centroid.lon, 0.0)?;
                kml.start_polygon(true)?;
                kml.polygon_start_outer_ring()?;
                kml.start_linear_ring()?;
                kml.linear_ring_add_vertex(ll.lat, ll.lon, 0.0)?;
                kml.linear_ring_add_vertex(ur.lat, ll.lon, 0.0)?;
                kml.linear_ring_add_vertex(ur.lat, ur.lon, 0.0)?;
                kml.linear_ring_add_vertex(ll.lat, ur.lon, 0.0)?;
                kml.linear_ring_add_vertex(ll.lat, ll.lon, 0.0)?;
                kml.finish_linear_ring()?;
                kml.polygon_finish_outer_ring()?;
                kml.finish_polygon()?;
                kml.finish_multi_geometry()?;
            } else {
                kml.create_point(centroid.lat, centroid.lon, 0.0)?;
            }
            kml.finish_placemark()?;

            if self.include_members {
                for pnt in site.members() {
                    kml.start_placemark(pnt.serial(), None, Some("#prediction"))?;
                    kml.create_point(pnt.lat(), pnt.lon(), 0.0)?;
                    kml.finish_placemark()?;
                }
            }

            kml.finish_folder()?;
        }

        kml.finish_folder()?;

        Ok(())
    }
}

/*-------------------------------------------------------------------------------------------------
 *                                        Output Rows
 *-----------------------------------------------------------------------------------------------*/

#[derive(Debug, Serialize)]
struct SiteRow {
    rank: usize,
    latitude: f64,
    longitude: f64,
    members: usize,
    spread_m: f64,
    confidence: f64,
    first_seen: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
}

impl SiteRow {
    const COLUMNS: [&'static str; 8] = [
        "rank",
        "latitude",
        "longitude",
        "members",
        "spread_m",
        "confidence",
        "first_seen",
        "last_seen",
    ];
}

impl From<&CandidateSite> for SiteRow {
    fn from(site: &CandidateSite) -> Self {
        let centroid = site.centroid();

        SiteRow {
            rank: site.rank(),
            latitude: round_to(centroid.lat, 6),
            longitude: round_to(centroid.lon, 6),
            members: site.count(),
            spread_m: round_to(site.spread_m(), 1),
            confidence: round_to(site.confidence(), 3),
            first_seen: site.first_seen(),
            last_seen: site.last_seen(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MemberRow<'a> {
    id: Option<&'a str>,
    serial: Option<&'a str>,
    #[serde(rename = "type")]
    sonde_type: Option<&'a str>,
    latitude: f64,
    longitude: f64,
    alt: Option<f64>,
    datetime: Option<DateTime<Utc>>,
}

impl<'a> From<&'a PredictionPoint> for MemberRow<'a> {
    fn from(pnt: &'a PredictionPoint) -> Self {
        MemberRow {
            id: pnt.id(),
            serial: pnt.serial(),
            sonde_type: pnt.sonde_type(),
            latitude: pnt.lat(),
            longitude: pnt.lon(),
            alt: pnt.altitude(),
            datetime: pnt.time(),
        }
    }
}

fn round_to(val: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (val * scale).round() / scale
}
