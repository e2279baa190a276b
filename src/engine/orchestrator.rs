//! End-to-end portfolio flood risk run.

use crate::core::error::ConfigError;
use crate::core::gauge::GaugeNetwork;
use crate::core::mortgage::Mortgage;
use crate::core::property::{Property, PropertyId};
use crate::credit::portfolio::PricingPortfolioMetrics;
use crate::credit::pricer::{MortgagePricer, MortgagePricing, PricingInputs, PricingRequest};
use crate::engine::config::RiskConfig;
use crate::hazard::damage::DepthDamageFunction;
use crate::hazard::event::{FloodEvent, FloodEventSelector, GaugeVulnerability};
use crate::hazard::interpolation::{FloodDepthInterpolator, InterpolationStrategy};
use crate::risk::assessment::{AdvancedMetrics, ElevationAnalysis, PortfolioSummary, PropertyRisk};
use crate::risk::clusters::{ClusterAnalysis, RiskClusterer};
use crate::risk::concentration::{ConcentrationAnalyzer, ConcentrationReport};
use crate::risk::correlation::CorrelationMatrix;
use crate::risk::monte_carlo::{LossMetrics, PortfolioMonteCarloSimulator};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Share of properties at risk above which the run is flagged.
const CALIBRATION_AT_RISK_PCT: f64 = 80.0;
/// Maximum depth above which the run is flagged, metres.
const CALIBRATION_MAX_DEPTH_M: f64 = 5.0;

/// Record counts of the run's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSummary {
    pub properties: usize,
    pub gauges: usize,
    pub gauges_with_readings: usize,
    pub mortgages: usize,
}

/// Depth and damage for every property, before any portfolio statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodAssessment {
    pub gauge_vulnerabilities: Vec<GaugeVulnerability>,
    pub event: FloodEvent,
    pub strategy: InterpolationStrategy,
    pub depths: Vec<f64>,
    pub impacts: Vec<f64>,
}

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config: RiskConfig,
    pub data_summary: DataSummary,
    pub gauge_vulnerabilities: Vec<GaugeVulnerability>,
    pub flood_event: FloodEvent,
    pub interpolation: InterpolationStrategy,
    pub property_risks: Vec<PropertyRisk>,
    pub summary: PortfolioSummary,
    pub advanced_metrics: AdvancedMetrics,
    pub elevation_analysis: ElevationAnalysis,
    pub mean_pairwise_correlation: f64,
    pub loss_distribution: LossMetrics,
    pub concentration: ConcentrationReport,
    pub clusters: ClusterAnalysis,
    pub mortgage_pricing: Vec<MortgagePricing>,
    pub pricing_metrics: PricingPortfolioMetrics,
}

impl fmt::Display for RiskReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Flood Risk Report ===")?;
        writeln!(f, "  Run:       {}", self.run_id)?;
        writeln!(f, "  Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(
            f,
            "  Inputs:    {} properties, {} gauges ({} with readings), {} mortgages",
            self.data_summary.properties,
            self.data_summary.gauges,
            self.data_summary.gauges_with_readings,
            self.data_summary.mortgages
        )?;
        writeln!(
            f,
            "  Event:     {} center(s){}, {:?} interpolation",
            self.flood_event.len(),
            if self.flood_event.is_fallback { " (fallback)" } else { "" },
            self.interpolation
        )?;
        for center in &self.flood_event.centers {
            writeln!(
                f,
                "    {:<24} radius {:>6.0} m  peak {:.2} m",
                center.name, center.radius_m, center.peak_depth_m
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.summary)?;
        writeln!(f)?;
        write!(f, "{}", self.loss_distribution)?;
        writeln!(f)?;
        write!(f, "{}", self.concentration)?;
        if !self.mortgage_pricing.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.pricing_metrics)?;
        }
        Ok(())
    }
}

/// Composes event selection, interpolation, damage, simulation,
/// concentration and pricing into one run.
#[derive(Debug, Clone)]
pub struct PortfolioRiskEngine {
    config: RiskConfig,
    damage: DepthDamageFunction,
}

impl PortfolioRiskEngine {
    pub fn new(config: RiskConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            damage: DepthDamageFunction::default(),
        })
    }

    pub fn with_damage_function(mut self, damage: DepthDamageFunction) -> Self {
        self.damage = damage;
        self
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Select the event and compute depth and damage per property.
    pub fn assess_flood(&self, properties: &[Property], network: &GaugeNetwork) -> FloodAssessment {
        let selector = FloodEventSelector::new(self.config.event.clone());
        let gauge_vulnerabilities = selector.rank_gauges(network);
        let event = selector.select(network);
        let interpolator = FloodDepthInterpolator::for_strategy(&self.config.interpolation, network, &event);
        let depths = interpolator.depths(properties);
        let impacts = self.damage.impact_ratios(&depths, properties);
        FloodAssessment {
            gauge_vulnerabilities,
            event,
            strategy: interpolator.strategy(),
            depths,
            impacts,
        }
    }

    /// Price each mortgage against its flood-impaired collateral.
    pub fn price_mortgages(
        &self,
        mortgages: &[Mortgage],
        properties: &[Property],
        impacts: &[f64],
    ) -> Vec<MortgagePricing> {
        let mut index: HashMap<&PropertyId, usize> = HashMap::with_capacity(properties.len());
        for (i, p) in properties.iter().enumerate() {
            if index.insert(p.id(), i).is_some() {
                warn!("duplicate property id {}; last record wins", p.id());
            }
        }

        let requests: Vec<PricingRequest> = mortgages
            .iter()
            .map(|m| {
                let (collateral, impact) = match index.get(m.property_id()) {
                    Some(&i) => (properties[i].value_f64(), impacts.get(i).copied().unwrap_or(0.0)),
                    None => {
                        warn!(
                            "mortgage {}: property {} not in portfolio; pricing on stated value",
                            m.id(),
                            m.property_id()
                        );
                        let stated = m
                            .stated_property_value()
                            .and_then(|v| v.to_f64())
                            .unwrap_or(0.0);
                        (stated, 0.0)
                    }
                };
                PricingRequest {
                    mortgage_id: m.id().clone(),
                    property_id: m.property_id().clone(),
                    flood_impact_ratio: impact,
                    inputs: PricingInputs::from_mortgage(m, collateral).with_flood_impact(impact),
                }
            })
            .collect();

        MortgagePricer::new(self.config.pricing).price_batch(&requests)
    }

    /// Full run over one portfolio.
    pub fn run(&self, properties: &[Property], network: &GaugeNetwork, mortgages: &[Mortgage]) -> RiskReport {
        info!(
            "risk run: {} properties, {} gauges, {} mortgages",
            properties.len(),
            network.gauge_count(),
            mortgages.len()
        );
        let assessment = self.assess_flood(properties, network);
        let FloodAssessment {
            gauge_vulnerabilities,
            event,
            strategy,
            depths,
            impacts,
        } = assessment;

        let property_risks = PropertyRisk::assess_all(properties, &depths, &impacts);
        let summary = PortfolioSummary::from_risks(&property_risks);

        let concentration =
            ConcentrationAnalyzer::new(self.config.concentration).analyze(properties, &depths, &impacts);
        let advanced_metrics = AdvancedMetrics::compute(&property_risks, concentration.hhi);
        let elevation_analysis = ElevationAnalysis::compute(&property_risks);

        let correlation = if properties.len() <= self.config.correlation.max_dense_properties {
            Some(CorrelationMatrix::from_properties(properties, &self.config.correlation))
        } else {
            warn!(
                "{} properties exceed the dense correlation limit of {}; using independent shocks",
                properties.len(),
                self.config.correlation.max_dense_properties
            );
            None
        };
        let values: Vec<f64> = properties.iter().map(Property::value_f64).collect();
        let losses = PortfolioMonteCarloSimulator::new(self.config.simulation.clone()).simulate(
            &impacts,
            &values,
            correlation.as_ref(),
        );

        let clusters = RiskClusterer::new(self.config.clusters).cluster(properties, &depths, &impacts);
        let mortgage_pricing = self.price_mortgages(mortgages, properties, &impacts);
        let pricing_metrics = PricingPortfolioMetrics::from_results(&mortgage_pricing);

        info!(
            "properties at risk: {}/{} ({:.1}%), value at risk {} ({:.1}%)",
            summary.properties_at_risk,
            summary.total_properties,
            summary.percentage_at_risk,
            summary.value_at_risk,
            summary.percentage_value_at_risk
        );
        info!(
            "loss VaR95 {:.2}, VaR99 {:.2}, ES99 {:.2}; geographic HHI {:.4}",
            losses.metrics().var_95,
            losses.metrics().var_99,
            losses.metrics().es_99,
            concentration.hhi
        );
        if summary.percentage_at_risk > CALIBRATION_AT_RISK_PCT {
            warn!(
                "{:.1}% of properties at risk; check event calibration",
                summary.percentage_at_risk
            );
        }
        if summary.max_flood_depth_m > CALIBRATION_MAX_DEPTH_M {
            warn!(
                "maximum flood depth {:.2} m exceeds typical limits; check elevation data",
                summary.max_flood_depth_m
            );
        }

        RiskReport {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            config: self.config.clone(),
            data_summary: DataSummary {
                properties: properties.len(),
                gauges: network.gauge_count(),
                gauges_with_readings: network.gauges_with_readings(),
                mortgages: mortgages.len(),
            },
            gauge_vulnerabilities,
            flood_event: event,
            interpolation: strategy,
            property_risks,
            summary,
            advanced_metrics,
            elevation_analysis,
            mean_pairwise_correlation: correlation.as_ref().map_or(0.0, CorrelationMatrix::mean_off_diagonal),
            loss_distribution: *losses.metrics(),
            concentration,
            clusters,
            mortgage_pricing,
            pricing_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gauge::{FloodThresholds, Gauge, GaugeReading};
    use crate::core::geo::GeoPoint;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn network() -> GaugeNetwork {
        let mut net = GaugeNetwork::new();
        let gauge = Gauge::new(
            "G1",
            Some(GeoPoint::new(51.5, -0.1)),
            5.0,
            FloodThresholds::new(1.0, 1.5, 2.0),
        )
        .unwrap();
        net.add_gauge(gauge);
        for (hour, level) in [(0, 1.2), (1, 2.4), (2, 1.9)] {
            net.add_reading(GaugeReading::new(
                "G1",
                Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
                level,
            ));
        }
        net
    }

    fn properties() -> Vec<Property> {
        vec![
            Property::new("P1", 51.5, -0.1, dec!(300000)).unwrap().with_elevation(4.0),
            Property::new("P2", 51.505, -0.1, dec!(450000)).unwrap().with_elevation(8.0),
            Property::new("P3", 51.6, -0.3, dec!(250000)).unwrap().with_elevation(30.0),
        ]
    }

    #[test]
    fn test_assess_flood_radial() {
        let engine = PortfolioRiskEngine::new(RiskConfig::default()).unwrap();
        let a = engine.assess_flood(&properties(), &network());
        assert_eq!(a.event.len(), 1);
        assert!(!a.event.is_fallback);
        assert_eq!(a.strategy, InterpolationStrategy::RadialDecay);
        assert!(a.depths[0] > a.depths[1]);
        assert_eq!(a.depths[2], 0.0);
        assert!(a.impacts.iter().all(|i| (0.0..=1.0).contains(i)));
    }

    #[test]
    fn test_flood_linked_pricing() {
        let engine = PortfolioRiskEngine::new(RiskConfig::default()).unwrap();
        let props = properties();
        let mortgages = vec![
            Mortgage::new("M1", "P1", dec!(240000), 0.04, 300, 240, dec!(80000)).unwrap(),
            Mortgage::new("M2", "P3", dec!(200000), 0.04, 300, 240, dec!(80000)).unwrap(),
            Mortgage::new("M3", "UNKNOWN", dec!(100000), 0.04, 300, 240, dec!(50000))
                .unwrap()
                .with_stated_property_value(dec!(200000)),
        ];
        let impacts = vec![0.5, 0.0, 0.0];
        let results = engine.price_mortgages(&mortgages, &props, &impacts);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].flood_impact_ratio, 0.5);
        let r0 = results[0].outcome.result();
        assert!((r0.ltv_ratio - 240_000.0 / 150_000.0).abs() < 1e-9);
        assert_eq!(results[2].flood_impact_ratio, 0.0);
        assert!((results[2].outcome.result().ltv_ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_run_report() {
        let engine = PortfolioRiskEngine::new(RiskConfig::default()).unwrap();
        let mortgages = vec![Mortgage::new("M1", "P1", dec!(240000), 0.04, 300, 240, dec!(80000)).unwrap()];
        let report = engine.run(&properties(), &network(), &mortgages);
        assert_eq!(report.data_summary.properties, 3);
        assert_eq!(report.data_summary.gauges_with_readings, 1);
        assert_eq!(report.property_risks.len(), 3);
        assert_eq!(report.loss_distribution.simulations, 1000);
        assert_eq!(report.mortgage_pricing.len(), 1);
        assert_eq!(report.pricing_metrics.total_mortgages, 1);
        assert!(report.summary.max_flood_depth_m > 0.0);
        let text = report.to_string();
        assert!(text.contains("=== Flood Risk Report ==="));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = RiskConfig::default();
        config.correlation.decay_distance_m = -1.0;
        assert!(PortfolioRiskEngine::new(config).is_err());
    }
}
