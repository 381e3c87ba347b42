//! Density-based clustering over the stored embeddings.
//!
//! HDBSCAN-family behavior with the same two tunables: `min_samples` drives
//! the core-distance estimate, `min_cluster_size` dissolves shallow clusters
//! into noise. The neighborhood radius is derived from the data (median core
//! distance), so no epsilon needs hand-tuning per corpus.

use nalgebra::DVector;

/// Tunable clustering parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Minimum members for a cluster to survive; smaller groups become noise.
    pub min_cluster_size: usize,
    /// Neighborhood size used for core-distance estimation.
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 5,
            min_samples: 3,
        }
    }
}

/// Label for points not assigned to any cluster.
pub const NOISE: i64 = -1;

/// Assign a cluster label to every embedding. Labels are non-negative
/// integers in order of each cluster's first member, or [`NOISE`].
///
/// Deterministic for a given input order.
pub fn cluster_labels(embeddings: &[DVector<f32>], params: &ClusterParams) -> Vec<i64> {
    let n = embeddings.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![NOISE];
    }

    let distances = distance_matrix(embeddings);
    let core_distances = core_distances(&distances, n, params.min_samples);
    let eps = median(&core_distances);

    // Flood fill: clusters grow through core points; border points within
    // eps of a cluster core attach but do not expand it.
    let mut labels = vec![NOISE; n];
    let mut next_label = 0i64;

    for seed in 0..n {
        if labels[seed] != NOISE || core_distances[seed] > eps {
            continue;
        }

        let label = next_label;
        next_label += 1;
        labels[seed] = label;
        let mut queue = vec![seed];

        while let Some(current) = queue.pop() {
            for neighbor in 0..n {
                if labels[neighbor] != NOISE || neighbor == current {
                    continue;
                }
                if distances[current * n + neighbor] <= eps {
                    labels[neighbor] = label;
                    if core_distances[neighbor] <= eps {
                        queue.push(neighbor);
                    }
                }
            }
        }
    }

    dissolve_small_clusters(&mut labels, params.min_cluster_size);
    renumber(&mut labels);
    labels
}

fn distance_matrix(embeddings: &[DVector<f32>]) -> Vec<f32> {
    let n = embeddings.len();
    let mut distances = vec![0.0f32; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = (&embeddings[i] - &embeddings[j]).norm();
            distances[i * n + j] = d;
            distances[j * n + i] = d;
        }
    }
    distances
}

/// Distance from each point to its `min_samples`-th nearest neighbor
/// (capped at the corpus size).
fn core_distances(distances: &[f32], n: usize, min_samples: usize) -> Vec<f32> {
    let k = min_samples.min(n - 1).max(1);
    let mut core = Vec::with_capacity(n);
    for i in 0..n {
        let mut row: Vec<f32> = (0..n)
            .filter(|&j| j != i)
            .map(|j| distances[i * n + j])
            .collect();
        row.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        core.push(row[k - 1]);
    }
    core
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn dissolve_small_clusters(labels: &mut [i64], min_cluster_size: usize) {
    let mut counts = std::collections::HashMap::new();
    for &label in labels.iter() {
        if label != NOISE {
            *counts.entry(label).or_insert(0usize) += 1;
        }
    }
    for label in labels.iter_mut() {
        if *label != NOISE && counts[label] < min_cluster_size {
            *label = NOISE;
        }
    }
}

/// Renumber surviving clusters 0..k in order of first appearance.
fn renumber(labels: &mut [i64]) {
    let mut mapping = std::collections::HashMap::new();
    let mut next = 0i64;
    for label in labels.iter_mut() {
        if *label == NOISE {
            continue;
        }
        let renumbered = *mapping.entry(*label).or_insert_with(|| {
            let value = next;
            next += 1;
            value
        });
        *label = renumbered;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(dim: usize, index: usize) -> DVector<f32> {
        let mut v = DVector::zeros(dim);
        v[index] = 1.0;
        v
    }

    #[test]
    fn empty_input_yields_no_labels() {
        let labels = cluster_labels(&[], &ClusterParams::default());
        assert!(labels.is_empty());
    }

    #[test]
    fn two_tight_groups_become_two_clusters() {
        let params = ClusterParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        let mut embeddings = Vec::new();
        for _ in 0..5 {
            embeddings.push(axis(8, 0));
        }
        for _ in 0..5 {
            embeddings.push(axis(8, 1));
        }
        let labels = cluster_labels(&embeddings, &params);
        assert_eq!(&labels[..5], &[0, 0, 0, 0, 0]);
        assert_eq!(&labels[5..], &[1, 1, 1, 1, 1]);
    }

    #[test]
    fn identical_points_form_one_cluster() {
        let params = ClusterParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        let embeddings = vec![axis(8, 0); 7];
        let labels = cluster_labels(&embeddings, &params);
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn scattered_points_become_noise() {
        let params = ClusterParams {
            min_cluster_size: 5,
            min_samples: 3,
        };
        // One tight group plus three mutually distant points.
        let mut embeddings = vec![axis(8, 0); 5];
        embeddings.push(axis(8, 1));
        embeddings.push(axis(8, 2));
        embeddings.push(axis(8, 3));
        let labels = cluster_labels(&embeddings, &params);
        assert_eq!(&labels[..5], &[0, 0, 0, 0, 0]);
        assert_eq!(&labels[5..], &[NOISE, NOISE, NOISE]);
    }

    #[test]
    fn labels_are_deterministic() {
        let params = ClusterParams::default();
        let mut embeddings = Vec::new();
        for i in 0..6 {
            let mut v = axis(8, 0);
            v[1] = (i as f32) * 0.01;
            embeddings.push(v);
        }
        let a = cluster_labels(&embeddings, &params);
        let b = cluster_labels(&embeddings, &params);
        assert_eq!(a, b);
    }
}
