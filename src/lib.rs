pub use cluster::{Cluster, ClusterList, ClusterParams};
pub use error::{LaunchSiteError, LaunchSiteResult};
pub use geo::{great_circle_distance, BoundingBox, Coord, Geo};
pub use kml::{KmlFile, KmlWriter, KmzFile};
pub use loader::{filter_unassigned, load, LoadOptions, LoadSummary, Loader};
pub use prediction::{PredictionList, PredictionPoint};
pub use report::{OutputFormat, Report, ReportOptions, RunSummary};
pub use site::{CandidateSite, ScoreParams};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cluster;
mod error;
mod geo;
mod kml;
mod loader;
mod prediction;
mod report;
mod site;
