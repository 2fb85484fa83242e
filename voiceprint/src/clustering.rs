//! Agglomerative average-linkage clustering over cosine distance.
//!
//! Average linkage is implemented with a count-weighted mean-vector proxy:
//! each cluster keeps an L2-renormalized weighted mean of its members, and
//! cluster distance is the cosine distance between means.

use crate::similarity::{cosine_similarity, l2_normalize};

/// Per-input labels plus the cluster count.
#[derive(Debug, Clone, Default)]
pub struct ClusterResult {
    /// Cluster label (0..num_clusters) per input embedding.
    pub labels: Vec<usize>,
    pub num_clusters: usize,
}

/// Cosine distance between two L2-normalized vectors, in [0, 2].
/// Returns 1 (orthogonal-equivalent) for empty or mismatched inputs.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    1.0 - cosine_similarity(a, b)
}

/// Bottom-up clustering of L2-normalized embeddings.
///
/// Repeatedly merges the closest pair of active clusters while the minimum
/// distance is at or below `threshold`, or while the active count still
/// exceeds `max_clusters` (0 = unlimited). Labels are compacted to 0..K-1
/// in first-appearance order.
pub fn agglomerative_cluster(
    embeddings: &[Vec<f32>],
    threshold: f32,
    max_clusters: usize,
) -> ClusterResult {
    let n = embeddings.len();
    if n == 0 {
        return ClusterResult::default();
    }
    if n == 1 {
        return ClusterResult {
            labels: vec![0],
            num_clusters: 1,
        };
    }

    let mut labels: Vec<usize> = (0..n).collect();
    let mut means: Vec<Vec<f32>> = embeddings.to_vec();
    let mut counts: Vec<usize> = vec![1; n];
    let mut active: Vec<bool> = vec![true; n];
    let mut num_active = n;

    while num_active > 1 {
        // Closest active pair.
        let mut best_dist = f32::MAX;
        let mut best = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in i + 1..n {
                if !active[j] {
                    continue;
                }
                let d = cosine_distance(&means[i], &means[j]);
                if d < best_dist {
                    best_dist = d;
                    best = Some((i, j));
                }
            }
        }

        let Some((i, j)) = best else { break };
        let over_cap = max_clusters > 0 && num_active > max_clusters;
        if best_dist > threshold && !over_cap {
            break;
        }

        // Merge j into i: count-weighted mean, re-normalized.
        let (ci, cj) = (counts[i], counts[j]);
        let total = (ci + cj) as f32;
        let mean_j = std::mem::take(&mut means[j]);
        for (mi, mj) in means[i].iter_mut().zip(mean_j.iter()) {
            *mi = (*mi * ci as f32 + mj * cj as f32) / total;
        }
        l2_normalize(&mut means[i]);
        counts[i] = ci + cj;
        active[j] = false;
        num_active -= 1;

        for label in labels.iter_mut() {
            if *label == j {
                *label = i;
            }
        }
    }

    // Compact labels to 0..K-1.
    let mut id_map: Vec<Option<usize>> = vec![None; n];
    let mut next_id = 0usize;
    let mut compact = Vec::with_capacity(n);
    for &label in &labels {
        let id = *id_map[label].get_or_insert_with(|| {
            let id = next_id;
            next_id += 1;
            id
        });
        compact.push(id);
    }

    ClusterResult {
        labels: compact,
        num_clusters: next_id,
    }
}
