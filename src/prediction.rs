/*!
 * A single reverse flight prediction.
 *
 * A PredictionPoint is the launch location computed by running a flight path prediction
 * backwards from where a radiosonde was tracked. Many predictions landing near the same spot are
 * the evidence that a launch site exists there.
 */

use crate::{
    error::LaunchSiteError,
    geo::{BoundingBox, Coord, Geo},
    LaunchSiteResult,
};
use chrono::{DateTime, Utc};

/**
 * Represents all the data kept from one prediction record.
 *
 * Once created a point is never modified, there are only accessors.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionPoint {
    coord: Coord,
    time: Option<DateTime<Utc>>,
    serial: Option<String>,
    id: Option<String>,
    altitude: Option<f64>,
    sonde_type: Option<String>,
}

impl PredictionPoint {
    /// Create a new point, checking that the coordinates are in range.
    pub fn new(lat: f64, lon: f64) -> LaunchSiteResult<Self> {
        let coord = Coord { lat, lon };
        if !coord.is_valid() {
            return Err(LaunchSiteError::data_format(format!(
                "coordinates out of range: lat={} lon={}",
                lat, lon
            ))
            .into());
        }

        Ok(PredictionPoint {
            coord,
            time: None,
            serial: None,
            id: None,
            altitude: None,
            sonde_type: None,
        })
    }

    pub fn with_time(self, time: Option<DateTime<Utc>>) -> Self {
        PredictionPoint { time, ..self }
    }

    pub fn with_serial(self, serial: Option<String>) -> Self {
        PredictionPoint { serial, ..self }
    }

    pub fn with_id(self, id: Option<String>) -> Self {
        PredictionPoint { id, ..self }
    }

    pub fn with_altitude(self, altitude: Option<f64>) -> Self {
        PredictionPoint { altitude, ..self }
    }

    pub fn with_sonde_type(self, sonde_type: Option<String>) -> Self {
        PredictionPoint { sonde_type, ..self }
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn lat(&self) -> f64 {
        self.coord.lat
    }

    pub fn lon(&self) -> f64 {
        self.coord.lon
    }

    /// Predicted launch time.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Serial number of the radiosonde this prediction was made for.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Identifier of the record in the export.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Altitude of the predicted launch point in meters.
    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    pub fn sonde_type(&self) -> Option<&str> {
        self.sonde_type.as_deref()
    }
}

/// A list of points in the order they were loaded.
#[derive(Debug, Clone, Default)]
pub struct PredictionList(Vec<PredictionPoint>);

impl PredictionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: PredictionPoint) {
        self.0.push(point)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredictionPoint> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<PredictionPoint> {
        self.0
    }
}

impl From<Vec<PredictionPoint>> for PredictionList {
    fn from(points: Vec<PredictionPoint>) -> Self {
        PredictionList(points)
    }
}

impl Extend<PredictionPoint> for PredictionList {
    fn extend<T: IntoIterator<Item = PredictionPoint>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl Geo for PredictionPoint {
    fn centroid(&self) -> Coord {
        self.coord
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            ll: self.coord,
            ur: self.coord,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_validates_range() {
        assert!(PredictionPoint::new(45.0, -120.0).is_ok());
        assert!(PredictionPoint::new(90.0, 180.0).is_ok());
        assert!(PredictionPoint::new(-90.0, -180.0).is_ok());

        for (lat, lon) in [
            (90.1, 0.0),
            (-90.1, 0.0),
            (0.0, 180.1),
            (0.0, -180.1),
            (f64::NAN, 0.0),
            (0.0, f64::INFINITY),
        ] {
            let err = PredictionPoint::new(lat, lon).unwrap_err();
            let err = err.downcast_ref::<LaunchSiteError>().unwrap();
            assert!(err.is_data_format());
        }
    }

    #[test]
    fn test_builder_keeps_coordinates() {
        let pnt = PredictionPoint::new(-37.5, 144.9)
            .unwrap()
            .with_serial(Some("S1234567".to_owned()))
            .with_altitude(Some(120.0))
            .with_sonde_type(Some("RS41-SGP".to_owned()));

        assert_eq!(pnt.lat(), -37.5);
        assert_eq!(pnt.lon(), 144.9);
        assert_eq!(pnt.serial(), Some("S1234567"));
        assert_eq!(pnt.altitude(), Some(120.0));
        assert_eq!(pnt.sonde_type(), Some("RS41-SGP"));
        assert_eq!(pnt.id(), None);
        assert_eq!(pnt.time(), None);
    }
}
