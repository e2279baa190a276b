//! Single flood center over a small street.
//!
//! Shows radial depth decay, the depth-damage curve and the portfolio
//! loss distribution for one hand-built flood center.

use flood_risk_engine::core::geo::{GeoPoint, METERS_PER_DEGREE};
use flood_risk_engine::core::property::{Property, PropertyType};
use flood_risk_engine::hazard::damage::DepthDamageFunction;
use flood_risk_engine::hazard::event::{FloodCenter, FloodEvent};
use flood_risk_engine::hazard::interpolation::FloodDepthInterpolator;
use flood_risk_engine::risk::assessment::{PortfolioSummary, PropertyRisk};
use flood_risk_engine::risk::correlation::{CorrelationConfig, CorrelationMatrix};
use flood_risk_engine::risk::monte_carlo::PortfolioMonteCarloSimulator;
use rust_decimal_macros::dec;

fn main() {
    println!("╔════════════════════════════════════════════╗");
    println!("║  flood-risk-engine: Single Center Example  ║");
    println!("╚════════════════════════════════════════════╝\n");

    let origin = GeoPoint::new(51.5074, -0.1278);
    let center = FloodCenter::new("Embankment", origin, 2000.0, 1.5).unwrap();
    let interp = FloodDepthInterpolator::RadialDecay(FloodEvent::from_centers(vec![center]));

    // One property every 250 m heading north, the last outside the radius
    let properties: Vec<Property> = (0..10)
        .map(|i| {
            let offset = i as f64 * 250.0 / METERS_PER_DEGREE;
            let kind = if i % 3 == 1 {
                PropertyType::Commercial
            } else {
                PropertyType::Residential
            };
            Property::new(
                format!("STREET-{:02}", i),
                origin.latitude + offset,
                origin.longitude,
                dec!(300000) + dec!(25000) * rust_decimal::Decimal::from(i),
            )
            .unwrap()
            .with_property_type(kind)
        })
        .collect();

    let depths = interp.depths(&properties);
    let impacts = DepthDamageFunction::default().impact_ratios(&depths, &properties);
    let risks = PropertyRisk::assess_all(&properties, &depths, &impacts);

    println!("━━━ Depth and Damage ━━━\n");
    for risk in &risks {
        println!(
            "  {:<10} {:>5.2} m  impact {:>5.3}  [{}]",
            risk.property_id, risk.flood_depth_m, risk.impact_ratio, risk.risk_level
        );
    }
    println!();

    println!("{}", PortfolioSummary::from_risks(&risks));

    println!("━━━ Correlated Loss Simulation ━━━\n");
    let values: Vec<f64> = properties.iter().map(Property::value_f64).collect();
    let matrix = CorrelationMatrix::from_properties(&properties, &CorrelationConfig::default());
    let losses = PortfolioMonteCarloSimulator::default().simulate(&impacts, &values, Some(&matrix));
    println!("  Mean pairwise correlation: {:.3}\n", matrix.mean_off_diagonal());
    println!("{}", losses.metrics());
}
