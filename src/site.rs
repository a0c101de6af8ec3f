/*!
 * Candidate launch sites.
 *
 * A CandidateSite is a Cluster that has been given a confidence score and a rank. A tight cluster
 * with many members is much more likely to be a real launch site than a loose cluster or a lone
 * prediction.
 */

use crate::{
    cluster::Cluster,
    error::LaunchSiteError,
    geo::{BoundingBox, Coord, Geo},
    prediction::PredictionPoint,
    LaunchSiteResult,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Parameters for the confidence score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreParams {
    spread_scale_m: f64,
}

impl ScoreParams {
    /// Create score parameters. The spread scale is in meters and must be positive.
    ///
    /// A cluster whose spread equals the scale gets half the confidence of a cluster with the same
    /// number of members and no spread at all.
    pub fn new(spread_scale_m: f64) -> LaunchSiteResult<Self> {
        if !spread_scale_m.is_finite() || spread_scale_m <= 0.0 {
            return Err(LaunchSiteError::config(format!(
                "spread scale must be a positive number of meters, got {}",
                spread_scale_m
            ))
            .into());
        }

        Ok(ScoreParams { spread_scale_m })
    }

    pub fn spread_scale_m(&self) -> f64 {
        self.spread_scale_m
    }

    /// The confidence score for a cluster of `count` members spread over `radius_m` meters.
    ///
    /// Grows with the member count and shrinks with the spread. A cluster with no spread scores
    /// its member count.
    pub fn confidence(&self, count: usize, radius_m: f64) -> f64 {
        count as f64 * self.spread_scale_m / (self.spread_scale_m + radius_m.max(0.0))
    }
}

/**
 * A cluster annotated with its confidence and rank.
 *
 * Sites are output only, there is no way to modify one after ranking.
 */
#[derive(Debug, Clone)]
pub struct CandidateSite {
    rank: usize,
    confidence: f64,
    cluster: Cluster,
}

impl CandidateSite {
    /// Score clusters and sort them from most to least likely to be a launch site.
    ///
    /// Ties in confidence go to the larger cluster, then to the more southern and western
    /// centroid so the ranking never depends on the input order. Ranks start at 1.
    pub fn rank_clusters(clusters: Vec<Cluster>, params: &ScoreParams) -> Vec<Self> {
        let mut scored: Vec<(f64, Cluster)> = clusters
            .into_iter()
            .map(|cluster| (params.confidence(cluster.count(), cluster.radius_m()), cluster))
            .collect();

        scored.sort_by(|(left_conf, left), (right_conf, right)| {
            right_conf
                .total_cmp(left_conf)
                .then_with(|| right.count().cmp(&left.count()))
                .then_with(|| compare_coords(left.centroid(), right.centroid()))
        });

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (confidence, cluster))| CandidateSite {
                rank: i + 1,
                confidence,
                cluster,
            })
            .collect()
    }

    /// Position in the ranking, 1 is the best candidate.
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn count(&self) -> usize {
        self.cluster.count()
    }

    /// Distance in meters from the centroid to the farthest prediction.
    pub fn spread_m(&self) -> f64 {
        self.cluster.radius_m()
    }

    pub fn members(&self) -> &[PredictionPoint] {
        self.cluster.members()
    }

    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.cluster.first_seen()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.cluster.last_seen()
    }
}

impl Geo for CandidateSite {
    fn centroid(&self) -> Coord {
        self.cluster.centroid()
    }

    fn bounding_box(&self) -> BoundingBox {
        self.cluster.bounding_box()
    }
}

fn compare_coords(left: Coord, right: Coord) -> Ordering {
    left.lat
        .total_cmp(&right.lat)
        .then_with(|| left.lon.total_cmp(&right.lon))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cluster::ClusterParams;

    #[test]
    fn test_score_params_validation() {
        assert!(ScoreParams::new(300.0).is_ok());

        for bad in [0.0, -1.0, f64::NAN] {
            let err = ScoreParams::new(bad).unwrap_err();
            assert!(err.downcast_ref::<LaunchSiteError>().unwrap().is_config());
        }
    }

    #[test]
    fn test_confidence_is_monotonic() {
        let params = ScoreParams::new(100.0).unwrap();

        assert_eq!(params.confidence(1, 0.0), 1.0);
        assert_eq!(params.confidence(7, 0.0), 7.0);
        assert_eq!(params.confidence(4, 100.0), 2.0);

        let mut last = 0.0;
        for count in 1..50 {
            let conf = params.confidence(count, 75.0);
            assert!(conf > last);
            last = conf;
        }

        let mut last = f64::INFINITY;
        for spread in [0.0, 1.0, 10.0, 100.0, 1000.0] {
            let conf = params.confidence(10, spread);
            assert!(conf < last);
            last = conf;
        }
    }

    #[test]
    fn test_ranking() {
        let mut points = vec![];

        // A loose pair.
        points.push(PredictionPoint::new(0.0, 0.0).unwrap());
        points.push(PredictionPoint::new(0.0009, 0.0).unwrap());

        // A tight triple.
        for i in 0..3 {
            points.push(PredictionPoint::new(30.0 + i as f64 * 0.00001, 30.0).unwrap());
        }

        // Two singletons that tie.
        points.push(PredictionPoint::new(-20.0, 5.0).unwrap());
        points.push(PredictionPoint::new(-40.0, 5.0).unwrap());

        let clusters = Cluster::from_points(points, &ClusterParams::new(150.0).unwrap());
        assert_eq!(clusters.len(), 4);

        let sites = CandidateSite::rank_clusters(clusters, &ScoreParams::new(150.0).unwrap());

        let counts: Vec<usize> = sites.iter().map(|s| s.count()).collect();
        assert_eq!(counts, vec![3, 2, 1, 1]);

        let ranks: Vec<usize> = sites.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        assert!(sites.windows(2).all(|w| w[0].confidence() >= w[1].confidence()));

        // The tie breaks toward the south.
        assert_eq!(sites[2].centroid().lat, -40.0);
        assert_eq!(sites[3].centroid().lat, -20.0);
    }

    #[test]
    fn test_empty_ranking() {
        let sites = CandidateSite::rank_clusters(vec![], &ScoreParams::new(10.0).unwrap());
        assert!(sites.is_empty());
    }
}
