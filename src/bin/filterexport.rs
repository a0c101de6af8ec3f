use clap::Parser;
use launchsites::LaunchSiteResult;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

/// Copy the predictions without an assigned launch site out of a newline delimited export.
///
/// Lines are copied unchanged, so the output can be fed to findsites or any other tool that reads
/// the export.
#[derive(Debug, Parser)]
#[clap(bin_name = "filterexport")]
#[clap(author, version, about)]
struct FilterExportOptions {
    /// The newline delimited export to read.
    ///
    /// If this is not specified, then the program will check for it in the "SONDE_EXPORT"
    /// environment variable.
    #[clap(env = "SONDE_EXPORT")]
    input: PathBuf,

    /// The file to write the unassigned predictions to.
    output: PathBuf,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> LaunchSiteResult<()> {
    let opts = FilterExportOptions::parse();

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    let (kept, read) =
        launchsites::filter_unassigned(&opts.input, &opts.output).map_err(|err| {
            log::error!("{}", err);
            err
        })?;

    info!(
        "Kept {} of {} predictions, wrote {}",
        kept,
        read,
        opts.output.display()
    );

    Ok(())
}
