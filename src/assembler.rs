use crate::clustering::ClusteringProvider;
use crate::color::Color;
use crate::error::{Error, Result};
use crate::sampler::Observation;

/// Clusters `observations` into `k` groups and turns the centers into a
/// palette, most populated cluster first.
///
/// Equal populations keep the order the provider returned them in. Channel
/// values are truncated, not rounded. Centers that are not three dimensional
/// are skipped.
pub fn assemble_palette<P>(observations: &[Observation], k: usize, provider: &P) -> Result<Vec<Color>>
where
    P: ClusteringProvider + ?Sized,
{
    let mut clusters = provider
        .partition(observations, k)
        .map_err(|e| Error::Clustering(e.to_string()))?;

    // `sort_by` is stable.
    clusters.sort_by(|a, b| b.members.cmp(&a.members));

    let palette = clusters
        .iter()
        .filter_map(|cluster| match cluster.center[..] {
            [r, g, b] => Some(Color::new(to_channel(r), to_channel(g), to_channel(b))),
            _ => None,
        })
        .collect();
    Ok(palette)
}

#[inline(always)]
fn to_channel(v: f32) -> u8 {
    (v * 255.0) as u8
}
