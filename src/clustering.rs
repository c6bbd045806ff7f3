use kmeans_colors::get_kmeans;
use thiserror::Error;

use crate::sampler::Observation;

/// Largest `k` the default provider supports; cluster indices are `u8`.
pub const MAX_CLUSTERS: usize = 256;

/// One partition of the observation set.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    /// Center coordinates, three normalized RGB channels for a well formed
    /// provider.
    pub center: Vec<f32>,
    /// Number of observations assigned to this cluster.
    pub members: usize,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ClusteringError(pub String);

/// Something that can split observations into `k` clusters.
///
/// Implementations must be shareable across the batch workers.
pub trait ClusteringProvider: Sync {
    fn partition(&self, observations: &[Observation], k: usize) -> Result<Vec<Cluster>, ClusteringError>;
}

/// k-means in sRGB backed by `kmeans_colors`.
///
/// Runs `runs` seeded passes and keeps the one with the lowest score, so the
/// same input always produces the same palette.
#[derive(Clone, Copy, Debug)]
pub struct KmeansProvider {
    pub max_iter: usize,
    pub converge: f32,
    pub runs: u64,
    pub seed: u64,
}

impl Default for KmeansProvider {
    fn default() -> Self {
        Self { max_iter: 20, converge: 1e-4, runs: 1, seed: 0 }
    }
}

impl ClusteringProvider for KmeansProvider {
    fn partition(&self, observations: &[Observation], k: usize) -> Result<Vec<Cluster>, ClusteringError> {
        if k == 0 || k > MAX_CLUSTERS {
            return Err(ClusteringError(format!("cluster count must be between 1 and {MAX_CLUSTERS}, got {k}")));
        }
        if observations.len() < k {
            return Err(ClusteringError(format!(
                "the size of the data set must at least equal k ({} < {k})",
                observations.len()
            )));
        }

        let best = (0..self.runs.max(1))
            .map(|run| get_kmeans(k, self.max_iter, self.converge, false, observations, self.seed.wrapping_add(run)))
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .ok_or_else(|| ClusteringError("k-means produced no result".into()))?;

        let mut members = vec![0usize; best.centroids.len()];
        for &idx in &best.indices {
            if let Some(count) = members.get_mut(idx as usize) {
                *count += 1;
            }
        }

        Ok(best
            .centroids
            .iter()
            .zip(members)
            .map(|(c, members)| Cluster { center: vec![c.red, c.green, c.blue], members })
            .collect())
    }
}
