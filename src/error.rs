use std::{
    error::Error,
    fmt::{Display, Formatter},
    io,
    path::{Path, PathBuf},
};

/// Result type used throughout the crate.
pub type LaunchSiteResult<T> = Result<T, Box<dyn Error>>;

/// The kinds of failure this crate reports on its own.
///
/// These are boxed into [LaunchSiteResult] like any other error, callers that care about the kind
/// can use `downcast_ref::<LaunchSiteError>()`.
#[derive(Debug)]
pub enum LaunchSiteError {
    /// A record (or a whole document) could not be turned into prediction points.
    DataFormat { reason: String },
    /// A command line or library parameter is not usable.
    Config { reason: String },
    /// Reading or writing a file failed.
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

impl LaunchSiteError {
    pub fn data_format<S: Into<String>>(reason: S) -> Self {
        LaunchSiteError::DataFormat {
            reason: reason.into(),
        }
    }

    pub fn config<S: Into<String>>(reason: S) -> Self {
        LaunchSiteError::Config {
            reason: reason.into(),
        }
    }

    pub fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        LaunchSiteError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_data_format(&self) -> bool {
        matches!(self, LaunchSiteError::DataFormat { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, LaunchSiteError::Config { .. })
    }

    pub fn is_io(&self) -> bool {
        matches!(self, LaunchSiteError::Io { .. })
    }
}

impl Display for LaunchSiteError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        match self {
            LaunchSiteError::DataFormat { reason } => write!(f, "data format error: {}", reason),
            LaunchSiteError::Config { reason } => write!(f, "configuration error: {}", reason),
            LaunchSiteError::Io { path, source } => {
                write!(f, "i/o error on {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for LaunchSiteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LaunchSiteError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/**
 * Tie an error from writing (or reading) `path` to that path.
 *
 * Errors that are already a [LaunchSiteError] pass through unchanged. Writer errors from the
 * libraries used for output are unwrapped to their underlying I/O error where they have one.
 */
pub(crate) fn with_path(path: &Path, err: Box<dyn Error>) -> Box<dyn Error> {
    if err.is::<LaunchSiteError>() {
        return err;
    }

    let err = match err.downcast::<io::Error>() {
        Ok(source) => return LaunchSiteError::io(path, *source).into(),
        Err(err) => err,
    };

    let err = match err.downcast::<serde_json::Error>() {
        Ok(source) => return LaunchSiteError::io(path, io::Error::from(*source)).into(),
        Err(err) => err,
    };

    let err = match err.downcast::<csv::Error>() {
        Ok(source) => {
            let source = match source.into_kind() {
                csv::ErrorKind::Io(source) => source,
                kind => io::Error::new(io::ErrorKind::Other, format!("{:?}", kind)),
            };
            return LaunchSiteError::io(path, source).into();
        }
        Err(err) => err,
    };

    let err = match err.downcast::<zip::result::ZipError>() {
        Ok(source) => {
            let source = match *source {
                zip::result::ZipError::Io(source) => source,
                other => io::Error::new(io::ErrorKind::Other, other.to_string()),
            };
            return LaunchSiteError::io(path, source).into();
        }
        Err(err) => err,
    };

    LaunchSiteError::io(path, io::Error::new(io::ErrorKind::Other, err.to_string())).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_with_path() {
        let pth = Path::new("/tmp/sites.csv");

        let err = with_path(pth, io::Error::new(io::ErrorKind::Other, "disk full").into());
        assert!(err.downcast_ref::<LaunchSiteError>().unwrap().is_io());
        assert_eq!(err.to_string(), "i/o error on /tmp/sites.csv: disk full");

        let err = with_path(pth, LaunchSiteError::config("no KMZ on stdout").into());
        assert!(err.downcast_ref::<LaunchSiteError>().unwrap().is_config());

        let err = with_path(pth, "something else".into());
        assert!(err.downcast_ref::<LaunchSiteError>().unwrap().is_io());
        assert!(err.to_string().contains("something else"));
    }
}
