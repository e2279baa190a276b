//! Engine configuration.
//!
//! Every section deserializes with defaults, so a JSON file only needs to
//! name the values it overrides:
//!
//! ```json
//! { "simulation": { "n_simulations": 5000, "seed": 7 },
//!   "interpolation": { "strategy": "inverse_distance_wse" } }
//! ```

use crate::core::error::ConfigError;
use crate::credit::pricer::PricingConfig;
use crate::hazard::event::EventConfig;
use crate::hazard::interpolation::InterpolationConfig;
use crate::risk::clusters::ClusterConfig;
use crate::risk::concentration::ConcentrationConfig;
use crate::risk::correlation::CorrelationConfig;
use crate::risk::monte_carlo::MonteCarloConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub event: EventConfig,
    pub interpolation: InterpolationConfig,
    pub correlation: CorrelationConfig,
    pub simulation: MonteCarloConfig,
    pub concentration: ConcentrationConfig,
    pub clusters: ClusterConfig,
    pub pricing: PricingConfig,
}

impl RiskConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event.max_centers == 0 {
            return Err(ConfigError::NotPositive {
                field: "event.max_centers",
                value: 0.0,
            });
        }
        if !self.event.min_vulnerability.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "event.min_vulnerability",
                value: self.event.min_vulnerability,
                min: f64::MIN,
                max: f64::MAX,
            });
        }
        if !(self.event.fallback_radius_m.is_finite() && self.event.fallback_radius_m > 0.0) {
            return Err(ConfigError::NotPositive {
                field: "event.fallback_radius_m",
                value: self.event.fallback_radius_m,
            });
        }
        if let Some(damping) = self.interpolation.far_gauge_damping {
            if !(damping.max_distance_m.is_finite() && damping.max_distance_m > 0.0) {
                return Err(ConfigError::NotPositive {
                    field: "interpolation.far_gauge_damping.max_distance_m",
                    value: damping.max_distance_m,
                });
            }
            if !(0.0..=1.0).contains(&damping.uncertainty_factor) {
                return Err(ConfigError::OutOfRange {
                    field: "interpolation.far_gauge_damping.uncertainty_factor",
                    value: damping.uncertainty_factor,
                    min: 0.0,
                    max: 1.0,
                });
            }
        }
        self.correlation.validate()?;
        self.simulation.validate()?;
        self.concentration.validate()?;
        self.clusters.validate()?;
        self.pricing.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hazard::interpolation::InterpolationStrategy;

    #[test]
    fn test_defaults_are_valid() {
        let config = RiskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.correlation.decay_distance_m, 1000.0);
        assert_eq!(config.correlation.base_correlation, 0.4);
        assert_eq!(config.simulation.n_simulations, 1000);
        assert_eq!(config.simulation.shock_magnitude, 0.2);
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.concentration.grid_cell_m, 1000.0);
        assert_eq!(config.pricing.tax_rate, 0.2);
        assert_eq!(config.event.max_centers, 5);
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = RiskConfig::from_json(
            r#"{"simulation": {"seed": 7}, "interpolation": {"strategy": "inverse_distance_wse"}}"#,
        )
        .unwrap();
        assert_eq!(config.simulation.seed, 7);
        assert_eq!(config.simulation.n_simulations, 1000);
        assert_eq!(config.interpolation.strategy, InterpolationStrategy::InverseDistanceWse);
        assert_eq!(config.correlation, CorrelationConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RiskConfig::from_json(r#"{"simulation": {"n_simulations": 0}}"#),
            Err(ConfigError::NoSimulations)
        ));
        assert!(matches!(
            RiskConfig::from_json(r#"{"pricing": {"tax_rate": 1.5}}"#),
            Err(ConfigError::OutOfRange { field: "tax_rate", .. })
        ));
        assert!(matches!(
            RiskConfig::from_json(r#"{"clusters": {"max_iterations": 0}}"#),
            Err(ConfigError::NotPositive {
                field: "clusters.max_iterations",
                ..
            })
        ));
        assert!(matches!(
            RiskConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
