use super::disjoint_set::DisjointSet;
use crate::{
    error::LaunchSiteError,
    geo::{distance_m, mean_coord, BoundingBox, Coord, Geo},
    prediction::PredictionPoint,
    LaunchSiteResult,
};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap as HashMap;

/// Parameters that control how points are grouped into clusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    threshold_m: f64,
}

impl ClusterParams {
    /// The default linking distance, about the size of a launch site with its balloon shed.
    pub const DEFAULT_THRESHOLD_M: f64 = 300.0;

    /// Create parameters with a linking distance in meters. It must be positive and finite.
    pub fn new(threshold_m: f64) -> LaunchSiteResult<Self> {
        if !threshold_m.is_finite() || threshold_m <= 0.0 {
            return Err(LaunchSiteError::config(format!(
                "clustering threshold must be a positive number of meters, got {}",
                threshold_m
            ))
            .into());
        }

        Ok(ClusterParams { threshold_m })
    }

    /// Points at or closer than this distance (in meters) are linked.
    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            threshold_m: Self::DEFAULT_THRESHOLD_M,
        }
    }
}

/**
 * The aggregate properties of a connected group of PredictionPoint objects.
 *
 * A cluster always has at least one member.
 */
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Average position of the points in the cluster.
    centroid: Coord,
    /// The distance in meters from the cluster center to the farthest point in the cluster.
    radius_m: f64,
    /// The points, in the order they were loaded.
    members: Vec<PredictionPoint>,
}

impl Cluster {
    /**
     * Group PredictionPoint objects into clusters.
     *
     * Points within the threshold distance of each other are linked, and linked points chain
     * together into a single cluster. To avoid comparing every pair, points are first dropped into
     * a 3D grid (Earth centered Cartesian coordinates) with cells as wide as the threshold. The
     * straight line distance never exceeds the great circle distance, so linked points are always
     * in the same or neighboring cells, including near the poles and across the antimeridian.
     *
     * #Arguments
     * points - the points to group, consumed and moved into the clusters.
     * params - the clustering parameters.
     *
     * #Returns
     * The clusters ordered by the position of their first member in `points`.
     */
    pub fn from_points(points: Vec<PredictionPoint>, params: &ClusterParams) -> Vec<Self> {
        if points.is_empty() {
            return vec![];
        }

        let threshold_m = params.threshold_m();
        let cell_size_km = threshold_m / 1000.0;

        let cells: Vec<(i64, i64, i64)> = points
            .iter()
            .map(|pnt| {
                let [x, y, z] = pnt.coord().to_cartesian();
                (
                    (x / cell_size_km).floor() as i64,
                    (y / cell_size_km).floor() as i64,
                    (z / cell_size_km).floor() as i64,
                )
            })
            .collect();

        let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::default();
        for (i, cell) in cells.iter().enumerate() {
            grid.entry(*cell).or_default().push(i);
        }

        let mut sets = DisjointSet::new(points.len());
        let mut comparisons: usize = 0;
        for (i, &(cx, cy, cz)) in cells.iter().enumerate() {
            for dx in -1..=1i64 {
                for dy in -1..=1i64 {
                    for dz in -1..=1i64 {
                        let key = (
                            cx.saturating_add(dx),
                            cy.saturating_add(dy),
                            cz.saturating_add(dz),
                        );

                        let bucket = match grid.get(&key) {
                            Some(bucket) => bucket,
                            None => continue,
                        };

                        // Each pair only needs to be checked from one side.
                        for &j in bucket.iter().filter(|&&j| j > i) {
                            if sets.same_set(i, j) {
                                continue;
                            }

                            comparisons += 1;
                            if distance_m(points[i].coord(), points[j].coord()) <= threshold_m {
                                sets.union(i, j);
                            }
                        }
                    }
                }
            }
        }

        log::debug!(
            "{} points in {} grid cells, {} distance comparisons",
            points.len(),
            grid.len(),
            comparisons
        );

        // Map each set representative to its output slot in order of first appearance.
        let mut slot_of_root: Vec<Option<usize>> = vec![None; points.len()];
        let mut groups: Vec<Vec<PredictionPoint>> = vec![];
        for (i, pnt) in points.into_iter().enumerate() {
            let root = sets.find(i);
            let slot = match slot_of_root[root] {
                Some(slot) => slot,
                None => {
                    groups.push(vec![]);
                    let slot = groups.len() - 1;
                    slot_of_root[root] = Some(slot);
                    slot
                }
            };

            groups[slot].push(pnt);
        }

        groups.into_iter().filter_map(Cluster::from_members).collect()
    }

    /// Build a cluster from its members, `None` if there are no members.
    fn from_members(members: Vec<PredictionPoint>) -> Option<Self> {
        let centroid = mean_coord(members.iter().map(|pnt| pnt.coord()))?;

        let radius_m = members
            .iter()
            .map(|pnt| distance_m(pnt.coord(), centroid))
            .fold(0.0, f64::max);

        Some(Cluster {
            centroid,
            radius_m,
            members,
        })
    }

    /// The number of points in this cluster.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// The distance in meters from the centroid to the farthest member.
    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn members(&self) -> &[PredictionPoint] {
        &self.members
    }

    pub fn into_members(self) -> Vec<PredictionPoint> {
        self.members
    }

    /// The earliest predicted launch time of any member, if any have one.
    pub fn first_seen(&self) -> Option<DateTime<Utc>> {
        self.members.iter().filter_map(|pnt| pnt.time()).min()
    }

    /// The latest predicted launch time of any member, if any have one.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.members.iter().filter_map(|pnt| pnt.time()).max()
    }
}

impl Geo for Cluster {
    fn centroid(&self) -> Coord {
        self.centroid
    }

    fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for pnt in &self.members {
            bbox.expand(pnt.coord());
        }
        bbox
    }
}
