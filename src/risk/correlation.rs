//! Distance-decay spatial correlation between properties.

use crate::core::error::ConfigError;
use crate::core::geo::GeoPoint;
use crate::core::property::Property;
use log::warn;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Calibration inputs for the correlation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Distance over which correlation decays by a factor of e, metres.
    pub decay_distance_m: f64,
    /// Correlation between two co-located (but distinct) properties.
    pub base_correlation: f64,
    /// Portfolios larger than this skip the dense matrix and simulate with
    /// independent shocks.
    pub max_dense_properties: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            decay_distance_m: 1000.0,
            base_correlation: 0.4,
            max_dense_properties: 5000,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_distance_m.is_finite() && self.decay_distance_m > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "decay_distance_m",
                value: self.decay_distance_m,
            });
        }
        if !(0.0..=1.0).contains(&self.base_correlation) {
            return Err(ConfigError::OutOfRange {
                field: "base_correlation",
                value: self.base_correlation,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }

    /// Off-diagonal correlation at a planar separation of `distance_km`.
    pub fn kernel(&self, distance_km: f64) -> f64 {
        let decay_km = self.decay_distance_m / 1000.0;
        let rho = self.base_correlation * (-distance_km / decay_km).exp();
        if rho.is_finite() {
            rho.clamp(0.0, self.base_correlation)
        } else {
            0.0
        }
    }
}

/// Pivots below this are treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Symmetric N×N correlation matrix with unit diagonal, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl CorrelationMatrix {
    /// Build from property locations. Rows are computed in parallel.
    pub fn from_properties(properties: &[Property], config: &CorrelationConfig) -> Self {
        let points: Vec<GeoPoint> = properties.iter().map(Property::location).collect();
        Self::from_points(&points, config)
    }

    pub fn from_points(points: &[GeoPoint], config: &CorrelationConfig) -> Self {
        let dim = points.len();
        let data: Vec<f64> = (0..dim)
            .into_par_iter()
            .flat_map_iter(|i| {
                let pi = points[i];
                points.iter().enumerate().map(move |(j, pj)| {
                    if i == j {
                        1.0
                    } else {
                        config.kernel(pi.planar_distance_km(pj))
                    }
                })
            })
            .collect();
        Self { dim, data }
    }

    /// Identity matrix: no correlation between distinct properties.
    pub fn identity(dim: usize) -> Self {
        let mut data = vec![0.0; dim * dim];
        for i in 0..dim {
            data[i * dim + i] = 1.0;
        }
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// Mean of the off-diagonal entries, 0 for fewer than two properties.
    pub fn mean_off_diagonal(&self) -> f64 {
        if self.dim < 2 {
            return 0.0;
        }
        let total: f64 = self.data.iter().sum::<f64>() - self.dim as f64;
        total / (self.dim * (self.dim - 1)) as f64
    }

    /// Lower-triangular Cholesky factor `L` with `L·Lᵀ = self`.
    ///
    /// Positive semi-definite matrices are accepted: a zero pivot leaves its
    /// column zero, so co-located properties at full correlation share one
    /// shock. Returns `None` only when a pivot is clearly negative or the
    /// matrix holds non-finite values.
    pub fn cholesky(&self) -> Option<CholeskyFactor> {
        let n = self.dim;
        let mut l = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l[i * n + k] * l[j * n + k];
                }
                if !sum.is_finite() {
                    warn!("correlation matrix has non-finite entries at row {}", i);
                    return None;
                }
                if i == j {
                    if sum < -PIVOT_TOLERANCE {
                        warn!("correlation matrix not positive semi-definite at row {}", i);
                        return None;
                    }
                    l[i * n + i] = sum.max(0.0).sqrt();
                } else if l[j * n + j] > PIVOT_TOLERANCE {
                    l[i * n + j] = sum / l[j * n + j];
                }
            }
        }
        Some(CholeskyFactor { dim: n, lower: l })
    }
}

/// Lower-triangular factor used to correlate independent normals.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    dim: usize,
    lower: Vec<f64>,
}

impl CholeskyFactor {
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.lower[i * self.dim + j]
    }

    /// Write `L·z` into `out`.
    pub fn correlate(&self, z: &[f64], out: &mut [f64]) {
        let n = self.dim;
        for i in 0..n {
            let row = &self.lower[i * n..i * n + i + 1];
            out[i] = row.iter().zip(&z[..=i]).map(|(a, b)| a * b).sum();
        }
    }
}
