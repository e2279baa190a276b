//! # flood-risk-engine
//!
//! Flood-driven financial risk for a portfolio of properties and the
//! mortgages secured against them.
//!
//! Given a network of water-level gauges and a property portfolio, the
//! engine selects a flood event, interpolates flood depth at each property,
//! converts depth to damage, simulates a correlated portfolio loss
//! distribution and prices each mortgage against its flood-impaired
//! collateral.
//!
//! ## Architecture
//!
//! - **core**: Validated records: properties, gauges and readings, mortgages
//! - **hazard**: Flood event selection, depth interpolation, depth-damage curve
//! - **risk**: Per-property assessment, spatial correlation, Monte Carlo,
//!   concentration and clustering
//! - **credit**: Credit spread curve and the mortgage amortization pricer
//! - **engine**: Configuration and the end-to-end orchestrator

pub mod core;
pub mod credit;
pub mod engine;
pub mod hazard;
pub mod risk;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::gauge::{FloodThresholds, Gauge, GaugeNetwork, GaugeReading};
    pub use crate::core::geo::GeoPoint;
    pub use crate::core::mortgage::Mortgage;
    pub use crate::core::property::{Property, PropertyType};
    pub use crate::credit::pricer::{MortgagePricer, PricingInputs, PricingOutcome, PricingResult};
    pub use crate::engine::config::RiskConfig;
    pub use crate::engine::orchestrator::{PortfolioRiskEngine, RiskReport};
    pub use crate::hazard::damage::DepthDamageFunction;
    pub use crate::hazard::event::{FloodCenter, FloodEvent, FloodEventSelector};
    pub use crate::hazard::interpolation::{FloodDepthInterpolator, InterpolationStrategy, WseField};
    pub use crate::risk::correlation::CorrelationMatrix;
    pub use crate::risk::monte_carlo::{LossDistribution, PortfolioMonteCarloSimulator};
}
