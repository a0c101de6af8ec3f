use clap::Parser;
use launchsites::{
    BoundingBox, ClusterList, ClusterParams, Coord, Geo, LaunchSiteError, LaunchSiteResult,
    LoadOptions, OutputFormat, Report, ReportOptions, ScoreParams,
};
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Find likely radiosonde launch sites in reverse flight predictions.
///
/// Predictions that land within the threshold distance of each other are grouped together, and
/// the groups are ranked by how many predictions they hold and how tightly they are packed.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findsites")]
#[clap(author, version, about)]
struct FindSitesOptionsInit {
    /// The prediction export, a JSON or newline delimited JSON file, or a directory of them.
    ///
    /// If this is not specified, then the program will check for it in the "SONDE_EXPORT"
    /// environment variable.
    #[clap(env = "SONDE_EXPORT")]
    input: PathBuf,

    /// Where to write the ranked sites. Use "-" or leave it off for standard output.
    output: Option<PathBuf>,

    /// Predictions closer than this many meters are linked into the same cluster.
    #[clap(short, long)]
    #[clap(env = "SONDE_THRESHOLD_M")]
    #[clap(default_value_t = ClusterParams::DEFAULT_THRESHOLD_M)]
    threshold: f64,

    /// Output format, one of json, csv, geojson, kml or kmz.
    ///
    /// If this is not specified it is taken from the output file extension, or JSON when writing
    /// to standard output.
    #[clap(short, long)]
    #[clap(parse(try_from_str=parse_format))]
    format: Option<OutputFormat>,

    /// Spread in meters that halves a site's confidence. Defaults to the threshold.
    #[clap(long)]
    spread_scale: Option<f64>,

    /// Leave out sites with fewer predictions than this.
    #[clap(long, default_value_t = 1)]
    min_members: usize,

    /// Only report this many of the best sites.
    #[clap(long)]
    top: Option<usize>,

    /// Include the individual predictions of each site in the output.
    #[clap(long)]
    members: bool,

    /// Only use predictions inside this box, given as bottom_lat,left_lon,top_lat,right_lon
    #[clap(long)]
    #[clap(parse(try_from_str=parse_bbox))]
    bbox: Option<BoundingBox>,

    /// Also use predictions that already have a launch site assigned.
    #[clap(long)]
    include_known_sites: bool,

    /// Use every prediction for a sonde instead of only the first one.
    #[clap(long)]
    keep_duplicates: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/// Parse an output format argument.
fn parse_format(format: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(format).map_err(|_| format!("Unknown output format: {}", format))
}

/// Parse a bounding box argument.
fn parse_bbox(bbox_str: &str) -> Result<BoundingBox, String> {
    let corners: Vec<_> = bbox_str.split(',').map(str::trim).collect();

    if corners.len() != 4 {
        return Err("Invalid number of coords".into());
    }

    let parse = |val: &str| -> Result<f64, String> {
        match val.parse::<f64>() {
            Ok(coord) if coord.is_finite() => Ok(coord),
            Ok(_) => Err(format!("Invalid coordinate {}: not a finite number", val)),
            Err(err) => Err(format!("Invalid coordinate {}: {}", val, err)),
        }
    };

    let min_lat = parse(corners[0])?;
    let min_lon = parse(corners[1])?;
    let max_lat = parse(corners[2])?;
    let max_lon = parse(corners[3])?;

    if min_lat >= max_lat || min_lon >= max_lon {
        return Err(format!(
            concat!(
                "Minimum Lat/Lon must be less than Maximum Lat/Lon:",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        ));
    }

    if min_lat < -90.0 || max_lat > 90.0 || min_lon < -180.0 || max_lon > 180.0 {
        return Err(format!(
            concat!(
                "Lat/Lon are out of range (-90.0 to 90.0 and -180.0 to 180.0):",
                " min_lat={} max_lat={} min_lon={} max_lon={}"
            ),
            min_lat, max_lat, min_lon, max_lon
        ));
    }

    let ll = Coord {
        lat: min_lat,
        lon: min_lon,
    };
    let ur = Coord {
        lat: max_lat,
        lon: max_lon,
    };

    Ok(BoundingBox { ll, ur })
}

#[derive(Debug)]
struct FindSitesOptionsChecked {
    /// The export file or directory.
    input: PathBuf,

    /// The output file, `None` for standard output.
    output: Option<PathBuf>,

    /// The output format.
    format: OutputFormat,

    /// How to cluster.
    cluster_params: ClusterParams,

    /// How to score.
    score_params: ScoreParams,

    /// What to load.
    load_opts: LoadOptions,

    /// What to report.
    report_opts: ReportOptions,
}

impl Display for FindSitesOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "         Input: {}", self.input.display())?;
        match &self.output {
            Some(output) => writeln!(f, "        Output: {}", output.display())?,
            None => writeln!(f, "        Output: standard output")?,
        }
        writeln!(f, "        Format: {}", self.format)?;
        writeln!(
            f,
            "     Threshold: {:.1} m",
            self.cluster_params.threshold_m()
        )?;
        writeln!(
            f,
            "  Spread Scale: {:.1} m",
            self.score_params.spread_scale_m()
        )?;
        writeln!(f, "   Min Members: {}", self.report_opts.min_members)?;
        if let Some(top) = self.report_opts.top {
            writeln!(f, "           Top: {}", top)?;
        }
        if let Some(bbox) = self.load_opts.bbox {
            writeln!(
                f,
                "  Bounding Box: ({:.6}, {:.6}) <---> ({:.6}, {:.6})",
                bbox.ll.lat, bbox.ll.lon, bbox.ur.lat, bbox.ur.lon
            )?;
        }
        writeln!(
            f,
            "   Known Sites: {}",
            if self.load_opts.include_known_sites {
                "included"
            } else {
                "skipped"
            }
        )?;
        writeln!(
            f,
            "    Duplicates: {}",
            if self.load_opts.keep_duplicates {
                "kept"
            } else {
                "skipped"
            }
        )?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Check the command line arguments.
///
/// Any parameter that can't be used is a configuration error, so this fails before anything is
/// loaded.
fn check_args(init: FindSitesOptionsInit) -> LaunchSiteResult<FindSitesOptionsChecked> {
    let FindSitesOptionsInit {
        input,
        output,
        threshold,
        format,
        spread_scale,
        min_members,
        top,
        members,
        bbox,
        include_known_sites,
        keep_duplicates,
        verbose,
    } = init;

    let output = output.filter(|pth| pth.as_os_str() != "-");

    let format = format
        .or_else(|| output.as_deref().and_then(OutputFormat::from_path))
        .unwrap_or(OutputFormat::Json);

    if output.is_none() && !format.is_streamable() {
        return Err(LaunchSiteError::config(format!(
            "{} output can't go to standard output, give an output file",
            format
        ))
        .into());
    }

    let cluster_params = ClusterParams::new(threshold)?;
    let score_params = ScoreParams::new(spread_scale.unwrap_or(threshold))?;

    let checked = FindSitesOptionsChecked {
        input,
        output,
        format,
        cluster_params,
        score_params,
        load_opts: LoadOptions {
            bbox,
            include_known_sites,
            keep_duplicates,
        },
        report_opts: ReportOptions {
            min_members,
            top,
            include_members: members,
        },
    };

    if verbose {
        info!(target:"startup", "{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> LaunchSiteResult<()> {
    let init = FindSitesOptionsInit::parse();

    let level = if init.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    run(init).map_err(|err| {
        log::error!("{}", err);
        err
    })
}

fn run(init: FindSitesOptionsInit) -> LaunchSiteResult<()> {
    let opts = check_args(init)?;

    //
    // Load the predictions.
    //
    let (points, load_summary) = launchsites::load(&opts.input, &opts.load_opts)?;

    //
    // Group them.
    //
    let clusters = ClusterList::from_predictions(points, opts.cluster_params);
    if let Some(biggest) = clusters.largest() {
        let Coord { lat, lon } = biggest.centroid();
        log::debug!(
            "Largest cluster: {} predictions at ({:.6}, {:.6})",
            biggest.count(),
            lat,
            lon
        );
    }

    //
    // Rank and output.
    //
    let report = Report::new(
        clusters,
        load_summary,
        &opts.score_params,
        &opts.report_opts,
    );
    report.log_summary();
    report.save(opts.format, opts.output.as_deref())?;

    if let Some(output) = &opts.output {
        info!("Wrote {} sites to {}", report.sites().len(), output.display());
    }

    Ok(())
}
