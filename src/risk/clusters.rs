//! Seeded k-means grouping of properties by flood exposure and location.

use crate::core::error::ConfigError;
use crate::core::property::Property;
use log::debug;
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const FEATURES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub k: usize,
    pub max_iterations: usize,
    pub seed: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 100,
            seed: 42,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::NotPositive {
                field: "clusters.max_iterations",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Aggregates for one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCluster {
    pub cluster: usize,
    pub property_count: usize,
    pub mean_depth_m: f64,
    pub mean_impact_ratio: f64,
    pub total_value: f64,
    pub value_at_risk: f64,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterAnalysis {
    /// Cluster index for each input property, in input order.
    pub assignments: Vec<usize>,
    pub clusters: Vec<RiskCluster>,
    pub iterations: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RiskClusterer {
    config: ClusterConfig,
}

impl RiskClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn cluster(&self, properties: &[Property], depths: &[f64], impacts: &[f64]) -> ClusterAnalysis {
        let n = properties.len().min(depths.len()).min(impacts.len());
        let k = self.config.k.min(n);
        if k == 0 {
            return ClusterAnalysis::default();
        }

        let mut rows: Vec<[f64; FEATURES]> = (0..n)
            .map(|i| {
                let loc = properties[i].location();
                [
                    depths[i],
                    impacts[i],
                    loc.longitude,
                    loc.latitude,
                    properties[i].value_f64().max(0.0).ln_1p(),
                ]
            })
            .collect();
        standardize(&mut rows);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut centroids: Vec<[f64; FEATURES]> = index::sample(&mut rng, n, k)
            .into_iter()
            .map(|i| rows[i])
            .collect();

        let mut assignments = vec![usize::MAX; n];
        // At least one assignment pass, so every property lands in a cluster.
        let max_iterations = self.config.max_iterations.max(1);
        let mut iterations = 0;
        while iterations < max_iterations {
            iterations += 1;
            let mut changed = false;
            for (row, slot) in rows.iter().zip(assignments.iter_mut()) {
                let nearest = nearest_centroid(row, &centroids);
                if *slot != nearest {
                    *slot = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            let mut sums = vec![[0.0; FEATURES]; k];
            let mut counts = vec![0usize; k];
            for (row, &c) in rows.iter().zip(&assignments) {
                counts[c] += 1;
                for f in 0..FEATURES {
                    sums[c][f] += row[f];
                }
            }
            for c in 0..k {
                // An emptied cluster keeps its previous centroid.
                if counts[c] > 0 {
                    for f in 0..FEATURES {
                        centroids[c][f] = sums[c][f] / counts[c] as f64;
                    }
                }
            }
        }
        debug!("k-means converged in {} iterations (k = {})", iterations, k);

        let clusters = (0..k)
            .filter_map(|c| {
                let members: Vec<usize> = (0..n).filter(|&i| assignments[i] == c).collect();
                if members.is_empty() {
                    return None;
                }
                let count = members.len() as f64;
                let mut cluster = RiskCluster {
                    cluster: c,
                    property_count: members.len(),
                    mean_depth_m: 0.0,
                    mean_impact_ratio: 0.0,
                    total_value: 0.0,
                    value_at_risk: 0.0,
                    centroid_latitude: 0.0,
                    centroid_longitude: 0.0,
                };
                for &i in &members {
                    let value = properties[i].value_f64();
                    let loc = properties[i].location();
                    cluster.mean_depth_m += depths[i] / count;
                    cluster.mean_impact_ratio += impacts[i] / count;
                    cluster.total_value += value;
                    cluster.value_at_risk += value * impacts[i];
                    cluster.centroid_latitude += loc.latitude / count;
                    cluster.centroid_longitude += loc.longitude / count;
                }
                Some(cluster)
            })
            .collect();

        ClusterAnalysis {
            assignments,
            clusters,
            iterations,
        }
    }
}

/// Scale each feature to zero mean and unit variance. Constant features
/// are centred only.
fn standardize(rows: &mut [[f64; FEATURES]]) {
    let n = rows.len() as f64;
    for f in 0..FEATURES {
        let mean = rows.iter().map(|r| r[f]).sum::<f64>() / n;
        let std = (rows.iter().map(|r| (r[f] - mean).powi(2)).sum::<f64>() / n).sqrt();
        let scale = if std > 1e-12 { std } else { 1.0 };
        for row in rows.iter_mut() {
            row[f] = (row[f] - mean) / scale;
        }
    }
}

fn nearest_centroid(row: &[f64; FEATURES], centroids: &[[f64; FEATURES]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist: f64 = row.iter().zip(centroid).map(|(a, b)| (a - b).powi(2)).sum();
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn two_groups() -> (Vec<Property>, Vec<f64>, Vec<f64>) {
        let mut props = Vec::new();
        let mut depths = Vec::new();
        let mut impacts = Vec::new();
        for i in 0..6 {
            props.push(Property::new(format!("W{}", i), 51.50 + i as f64 * 1e-4, -0.20, dec!(200000)).unwrap());
            depths.push(1.5);
            impacts.push(0.5);
        }
        for i in 0..6 {
            props.push(Property::new(format!("D{}", i), 51.60 + i as f64 * 1e-4, -0.05, dec!(200000)).unwrap());
            depths.push(0.0);
            impacts.push(0.0);
        }
        (props, depths, impacts)
    }

    #[test]
    fn test_separates_obvious_groups() {
        let (props, depths, impacts) = two_groups();
        let result = RiskClusterer::new(ClusterConfig {
            k: 2,
            ..Default::default()
        })
        .cluster(&props, &depths, &impacts);
        assert_eq!(result.clusters.len(), 2);
        let wet = result.assignments[0];
        assert!(result.assignments[..6].iter().all(|&c| c == wet));
        assert!(result.assignments[6..].iter().all(|&c| c != wet));
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let (props, depths, impacts) = two_groups();
        let clusterer = RiskClusterer::default();
        assert_eq!(
            clusterer.cluster(&props, &depths, &impacts),
            clusterer.cluster(&props, &depths, &impacts)
        );
    }

    #[test]
    fn test_k_clamped_to_portfolio() {
        let (props, depths, impacts) = two_groups();
        let result = RiskClusterer::new(ClusterConfig {
            k: 50,
            ..Default::default()
        })
        .cluster(&props[..3], &depths[..3], &impacts[..3]);
        assert!(result.clusters.len() <= 3);
        assert_eq!(result.assignments.len(), 3);
        let total: usize = result.clusters.iter().map(|c| c.property_count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_empty_input() {
        let result = RiskClusterer::default().cluster(&[], &[], &[]);
        assert!(result.clusters.is_empty());
        assert!(result.assignments.is_empty());
    }

    #[test]
    fn test_zero_iterations_still_assigns_every_property() {
        let (props, depths, impacts) = two_groups();
        let config = ClusterConfig {
            k: 2,
            max_iterations: 0,
            seed: 3,
        };
        assert!(config.validate().is_err());
        let result = RiskClusterer::new(config).cluster(&props, &depths, &impacts);
        assert_eq!(result.iterations, 1);
        assert!(result.assignments.iter().all(|&c| c < 2));
        let counted: usize = result.clusters.iter().map(|c| c.property_count).sum();
        assert_eq!(counted, props.len());
    }
}
