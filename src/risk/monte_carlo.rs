//! Correlated Monte Carlo simulation of portfolio flood loss.
//!
//! Trials are grouped into fixed-size blocks. Each block draws from its
//! own `ChaCha8Rng` stream derived from the configured seed, so a run is
//! reproducible regardless of how rayon schedules the blocks.

use crate::core::error::ConfigError;
use crate::risk::correlation::{CholeskyFactor, CorrelationMatrix};
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Trials per random stream.
pub const BLOCK_SIZE: usize = 256;

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    /// Relative size of a one-sigma shock to each impact ratio.
    pub shock_magnitude: f64,
    pub seed: u64,
    /// Hard ceiling on `n_simulations`.
    pub max_simulations: usize,
    /// Wall-clock budget in milliseconds. Blocks not started when it
    /// expires are skipped and the result is marked truncated.
    pub time_budget_ms: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            shock_magnitude: 0.2,
            seed: 42,
            max_simulations: 1_000_000,
            time_budget_ms: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_simulations == 0 || self.max_simulations == 0 {
            return Err(ConfigError::NoSimulations);
        }
        if !(self.shock_magnitude.is_finite() && self.shock_magnitude >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "shock_magnitude",
                value: self.shock_magnitude,
                min: 0.0,
                max: f64::INFINITY,
            });
        }
        Ok(())
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }

    /// Trials that will actually be scheduled.
    pub fn effective_simulations(&self) -> usize {
        self.n_simulations.min(self.max_simulations).max(1)
    }
}

/// Summary statistics of a simulated loss distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossMetrics {
    pub simulations: usize,
    pub mean_loss: f64,
    pub std_loss: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub es_95: f64,
    pub es_99: f64,
    pub min_loss: f64,
    pub max_loss: f64,
    pub truncated: bool,
}

/// Simulated portfolio losses, in trial order, with their metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct LossDistribution {
    losses: Vec<f64>,
    metrics: LossMetrics,
}

impl LossDistribution {
    pub fn from_losses(losses: Vec<f64>, truncated: bool) -> Self {
        let mut sorted = losses.clone();
        sorted.sort_by(f64::total_cmp);

        let metrics = if sorted.is_empty() {
            LossMetrics {
                truncated,
                ..Default::default()
            }
        } else {
            let n = sorted.len() as f64;
            let mean = sorted.iter().sum::<f64>() / n;
            let variance = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let var_95 = percentile(&sorted, 95.0);
            let var_99 = percentile(&sorted, 99.0);
            LossMetrics {
                simulations: sorted.len(),
                mean_loss: mean,
                std_loss: variance.sqrt(),
                var_95,
                var_99,
                es_95: tail_mean(&sorted, var_95),
                es_99: tail_mean(&sorted, var_99),
                min_loss: sorted[0],
                max_loss: sorted[sorted.len() - 1],
                truncated,
            }
        };
        Self { losses, metrics }
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn metrics(&self) -> &LossMetrics {
        &self.metrics
    }

    pub fn is_truncated(&self) -> bool {
        self.metrics.truncated
    }
}

impl fmt::Display for LossMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Loss Distribution ({} trials) ===", self.simulations)?;
        writeln!(f, "  Mean:  {:.2}", self.mean_loss)?;
        writeln!(f, "  Std:   {:.2}", self.std_loss)?;
        writeln!(f, "  VaR95: {:.2}  ES95: {:.2}", self.var_95, self.es_95)?;
        writeln!(f, "  VaR99: {:.2}  ES99: {:.2}", self.var_99, self.es_99)?;
        writeln!(f, "  Range: {:.2} .. {:.2}", self.min_loss, self.max_loss)?;
        if self.truncated {
            writeln!(f, "  (truncated by time budget)")?;
        }
        Ok(())
    }
}

/// Linear interpolation between order statistics of a sorted sample.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Mean of the losses at or above `threshold`, never below it.
///
/// Excesses are averaged rather than raw losses so that a tail of tied
/// values cannot round to one step under the threshold.
fn tail_mean(sorted: &[f64], threshold: f64) -> f64 {
    let start = sorted.partition_point(|x| *x < threshold);
    let tail = &sorted[start..];
    if tail.is_empty() {
        return threshold;
    }
    let excess = tail.iter().map(|x| x - threshold).sum::<f64>() / tail.len() as f64;
    (threshold + excess).max(threshold)
}

/// Shocks impact ratios with correlated normals and sums the losses.
#[derive(Debug, Clone, Default)]
pub struct PortfolioMonteCarloSimulator {
    config: MonteCarloConfig,
}

impl PortfolioMonteCarloSimulator {
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Simulate portfolio losses.
    ///
    /// `impacts[i]` and `values[i]` describe property `i`. Without a usable
    /// correlation matrix (absent, wrong size or not positive definite)
    /// each property receives an independent shock.
    pub fn simulate(
        &self,
        impacts: &[f64],
        values: &[f64],
        correlation: Option<&CorrelationMatrix>,
    ) -> LossDistribution {
        let n_props = impacts.len().min(values.len());
        let factor = correlation.and_then(|m| {
            if m.dim() != n_props {
                warn!(
                    "correlation matrix is {}x{} but portfolio has {} properties; using independent shocks",
                    m.dim(),
                    m.dim(),
                    n_props
                );
                return None;
            }
            let factor = m.cholesky();
            if factor.is_none() {
                warn!("Cholesky factorisation failed; using independent shocks");
            }
            factor
        });

        let n_sims = self.config.effective_simulations();
        if n_sims < self.config.n_simulations {
            warn!(
                "simulation count {} capped at {}",
                self.config.n_simulations, n_sims
            );
        }
        let n_blocks = n_sims.div_ceil(BLOCK_SIZE);
        let budget = self.config.time_budget();
        let started = Instant::now();

        let blocks: Vec<Option<Vec<f64>>> = (0..n_blocks)
            .into_par_iter()
            .map(|block| {
                if block > 0 {
                    if let Some(limit) = budget {
                        if started.elapsed() >= limit {
                            return None;
                        }
                    }
                }
                let trials = BLOCK_SIZE.min(n_sims - block * BLOCK_SIZE);
                Some(self.run_block(
                    block as u64,
                    trials,
                    &impacts[..n_props],
                    &values[..n_props],
                    factor.as_ref(),
                ))
            })
            .collect();

        let truncated = blocks.iter().any(Option::is_none);
        let losses: Vec<f64> = blocks.into_iter().flatten().flatten().collect();
        if truncated {
            warn!(
                "Monte Carlo run truncated after {} of {} trials",
                losses.len(),
                n_sims
            );
        }
        debug!(
            "simulated {} trials over {} properties in {:?}",
            losses.len(),
            n_props,
            started.elapsed()
        );
        LossDistribution::from_losses(losses, truncated)
    }

    fn run_block(
        &self,
        block: u64,
        trials: usize,
        impacts: &[f64],
        values: &[f64],
        factor: Option<&CholeskyFactor>,
    ) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(block);

        let n = impacts.len();
        let mut z = vec![0.0; n];
        let mut correlated = vec![0.0; n];
        let magnitude = self.config.shock_magnitude;

        (0..trials)
            .map(|_| {
                for zi in z.iter_mut() {
                    *zi = rng.sample(StandardNormal);
                }
                let shocks: &[f64] = match factor {
                    Some(l) => {
                        l.correlate(&z, &mut correlated);
                        &correlated
                    }
                    None => &z,
                };
                impacts
                    .iter()
                    .zip(values)
                    .zip(shocks)
                    .map(|((impact, value), shock)| {
                        let shocked = (impact * (1.0 + magnitude * shock)).clamp(0.0, 1.0);
                        value * shocked
                    })
                    .sum::<f64>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::GeoPoint;
    use crate::risk::correlation::CorrelationConfig;
    use approx::assert_relative_eq;

    fn portfolio() -> (Vec<f64>, Vec<f64>, CorrelationMatrix) {
        let impacts = vec![0.4, 0.25, 0.0, 0.6, 0.1];
        let values = vec![250_000.0, 400_000.0, 150_000.0, 900_000.0, 300_000.0];
        let points: Vec<GeoPoint> = (0..5)
            .map(|i| GeoPoint::new(51.50 + i as f64 * 0.003, -0.12))
            .collect();
        let m = CorrelationMatrix::from_points(&points, &CorrelationConfig::default());
        (impacts, values, m)
    }

    #[test]
    fn test_same_seed_same_losses() {
        let (impacts, values, m) = portfolio();
        let sim = PortfolioMonteCarloSimulator::default();
        let a = sim.simulate(&impacts, &values, Some(&m));
        let b = sim.simulate(&impacts, &values, Some(&m));
        assert_eq!(a.losses(), b.losses());
        assert_eq!(a.losses().len(), 1000);
        assert!(!a.is_truncated());
    }

    #[test]
    fn test_different_seed_different_losses() {
        let (impacts, values, m) = portfolio();
        let a = PortfolioMonteCarloSimulator::default().simulate(&impacts, &values, Some(&m));
        let b = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            seed: 7,
            ..Default::default()
        })
        .simulate(&impacts, &values, Some(&m));
        assert_ne!(a.losses(), b.losses());
    }

    #[test]
    fn test_zero_shock_is_deterministic_expected_loss() {
        let (impacts, values, m) = portfolio();
        let sim = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            shock_magnitude: 0.0,
            n_simulations: 300,
            ..Default::default()
        });
        let dist = sim.simulate(&impacts, &values, Some(&m));
        let expected: f64 = impacts.iter().zip(&values).map(|(i, v)| i * v).sum();
        let metrics = dist.metrics();
        assert_relative_eq!(metrics.mean_loss, expected, max_relative = 1e-12);
        assert_relative_eq!(metrics.var_99, expected, max_relative = 1e-12);
        assert_relative_eq!(metrics.std_loss, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_tail_metrics_ordering() {
        let (impacts, values, m) = portfolio();
        let dist = PortfolioMonteCarloSimulator::default().simulate(&impacts, &values, Some(&m));
        let s = dist.metrics();
        assert!(s.min_loss <= s.var_95);
        assert!(s.var_95 <= s.var_99);
        assert!(s.var_99 <= s.max_loss);
        assert!(s.es_95 >= s.var_95);
        assert!(s.es_99 >= s.var_99);
    }

    #[test]
    fn test_identity_matches_independent() {
        let (impacts, values, _) = portfolio();
        let sim = PortfolioMonteCarloSimulator::default();
        let identity = CorrelationMatrix::identity(impacts.len());
        let a = sim.simulate(&impacts, &values, Some(&identity));
        let b = sim.simulate(&impacts, &values, None);
        assert_eq!(a.losses(), b.losses());
    }

    #[test]
    fn test_mismatched_matrix_falls_back() {
        let (impacts, values, _) = portfolio();
        let sim = PortfolioMonteCarloSimulator::default();
        let wrong = CorrelationMatrix::identity(2);
        let a = sim.simulate(&impacts, &values, Some(&wrong));
        let b = sim.simulate(&impacts, &values, None);
        assert_eq!(a.losses(), b.losses());
    }

    #[test]
    fn test_simulation_cap() {
        let (impacts, values, _) = portfolio();
        let sim = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            n_simulations: 5000,
            max_simulations: 600,
            ..Default::default()
        });
        assert_eq!(sim.simulate(&impacts, &values, None).losses().len(), 600);
    }

    #[test]
    fn test_empty_portfolio_zero_losses() {
        let dist = PortfolioMonteCarloSimulator::default().simulate(&[], &[], None);
        assert_eq!(dist.metrics().max_loss, 0.0);
        assert_eq!(dist.metrics().simulations, 1000);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 50.0), 20.0);
        assert_relative_eq!(percentile(&sorted, 95.0), 38.0, epsilon = 1e-9);
        assert_eq!(percentile(&sorted, 100.0), 40.0);
    }

    #[test]
    fn test_expected_shortfall_averages_tail() {
        let losses: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let dist = LossDistribution::from_losses(losses, false);
        let m = dist.metrics();
        assert_relative_eq!(m.var_95, 95.05, epsilon = 1e-9);
        assert_relative_eq!(m.es_95, 98.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tied_tail_keeps_shortfall_at_var() {
        for x in [0.101, 0.3, 1.7, 12_345.678, 250_000.1] {
            let dist = LossDistribution::from_losses(vec![x; 1000], false);
            let m = dist.metrics();
            assert_eq!(m.var_95, x);
            assert_eq!(m.var_99, x);
            assert!(m.es_95 >= m.var_95, "es95 {} < var95 {}", m.es_95, m.var_95);
            assert!(m.es_99 >= m.var_99, "es99 {} < var99 {}", m.es_99, m.var_99);
        }
    }

    #[test]
    fn test_zero_shock_shortfall_not_below_var() {
        let (impacts, values, m) = portfolio();
        let sim = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            shock_magnitude: 0.0,
            ..Default::default()
        });
        let metrics = *sim.simulate(&impacts, &values, Some(&m)).metrics();
        assert!(metrics.es_95 >= metrics.var_95);
        assert!(metrics.es_99 >= metrics.var_99);
    }

    #[test]
    fn test_perfect_correlation_moves_losses_together() {
        let point = GeoPoint::new(51.5, -0.1);
        let config = CorrelationConfig {
            base_correlation: 1.0,
            ..Default::default()
        };
        let m = CorrelationMatrix::from_points(&[point, point, point], &config);
        let impacts = vec![0.3; 3];
        let values = vec![200_000.0; 3];
        let sim = PortfolioMonteCarloSimulator::default();

        let correlated = sim.simulate(&impacts, &values, Some(&m));
        let independent = sim.simulate(&impacts, &values, None);
        assert_ne!(correlated.losses(), independent.losses());

        // Shared shock: std is 3 × 0.3 × 0.2 × 200k, √3 times the independent one.
        assert_relative_eq!(correlated.metrics().std_loss, 36_000.0, max_relative = 0.1);
        let ratio = correlated.metrics().std_loss / independent.metrics().std_loss;
        assert!(ratio > 1.5 && ratio < 2.0, "std ratio {}", ratio);
    }
}
