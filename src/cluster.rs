/*!
 * Types and functions for working with clusters.
 *
 * A cluster describes the aggregate properties of a connected group (or cluster) of
 * PredictionPoint objects. Two points are connected when they are within the clustering
 * threshold of each other, and connection is transitive (single linkage).
 */

pub use cluster::{Cluster, ClusterParams};
pub use cluster_list::ClusterList;

mod cluster;
mod cluster_list;
mod disjoint_set;
