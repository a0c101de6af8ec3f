use super::{Cluster, ClusterParams};
use crate::prediction::PredictionList;

/**
 * Keep a cluster list with metadata about the run it was derived from.
 */
#[derive(Debug, Clone)]
pub struct ClusterList {
    /// The parameters the clusters were built with.
    pub params: ClusterParams,
    /// How many points went into the clustering.
    pub num_points: usize,
    /// The clusters, ordered by the load order of their first member.
    pub clusters: Vec<Cluster>,
}

impl ClusterList {
    /**
     * Cluster a list of loaded predictions.
     *
     * #Arguments
     * points - the loaded predictions, these are moved into the clusters.
     * params - the clustering parameters.
     */
    pub fn from_predictions(points: PredictionList, params: ClusterParams) -> Self {
        let num_points = points.len();
        let clusters = Cluster::from_points(points.into_vec(), &params);

        log::info!(
            "Grouped {} points into {} clusters (threshold {:.0} m).",
            num_points,
            clusters.len(),
            params.threshold_m()
        );

        ClusterList {
            params,
            num_points,
            clusters,
        }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// The cluster with the most members, the first one found wins a tie.
    pub fn largest(&self) -> Option<&Cluster> {
        self.clusters
            .iter()
            .reduce(|big, c| if c.count() > big.count() { c } else { big })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prediction::PredictionPoint;

    #[test]
    fn test_from_predictions() {
        let points: PredictionList = vec![
            PredictionPoint::new(10.0, 10.0).unwrap(),
            PredictionPoint::new(50.0, 50.0).unwrap(),
            PredictionPoint::new(50.0001, 50.0).unwrap(),
        ]
        .into();

        let list = ClusterList::from_predictions(points, ClusterParams::new(100.0).unwrap());

        assert_eq!(list.num_points, 3);
        assert_eq!(list.len(), 2);
        assert_eq!(list.largest().map(|c| c.count()), Some(2));
    }

    #[test]
    fn test_empty() {
        let list = ClusterList::from_predictions(PredictionList::new(), ClusterParams::default());
        assert!(list.is_empty());
        assert_eq!(list.num_points, 0);
        assert!(list.largest().is_none());
    }
}
