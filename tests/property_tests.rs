use flood_risk_engine::core::gauge::GaugeId;
use flood_risk_engine::core::geo::GeoPoint;
use flood_risk_engine::core::property::{Property, PropertyType};
use flood_risk_engine::credit::pricer::{MortgagePricer, PricingInputs};
use flood_risk_engine::hazard::damage::DepthDamageFunction;
use flood_risk_engine::hazard::event::{FloodCenter, FloodEvent};
use flood_risk_engine::hazard::interpolation::{FloodDepthInterpolator, WseField, WseStation};
use flood_risk_engine::risk::correlation::{CorrelationConfig, CorrelationMatrix};
use flood_risk_engine::risk::monte_carlo::{MonteCarloConfig, PortfolioMonteCarloSimulator};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// A point inside a small city-sized box so that centers and properties interact.
fn arb_point() -> impl Strategy<Value = GeoPoint> {
    (51.40f64..51.60, -0.25f64..0.05).prop_map(|(lat, lon)| GeoPoint::new(lat, lon))
}

fn arb_property_type() -> impl Strategy<Value = PropertyType> {
    prop::sample::select(vec![
        PropertyType::Residential,
        PropertyType::Commercial,
        PropertyType::Industrial,
    ])
}

/// A property with random location, elevation, floor and type.
fn arb_property() -> impl Strategy<Value = Property> {
    (
        arb_point(),
        -5.0f64..60.0,
        0.0f64..2.0,
        arb_property_type(),
        50_000u64..2_000_000u64,
    )
        .prop_map(|(point, elevation, floor, kind, value)| {
            Property::new("P", point.latitude, point.longitude, Decimal::from(value))
                .unwrap()
                .with_elevation(elevation)
                .with_floor_level(floor)
                .unwrap()
                .with_property_type(kind)
        })
}

fn arb_center() -> impl Strategy<Value = FloodCenter> {
    (arb_point(), 100.0f64..5000.0, 0.0f64..3.0)
        .prop_map(|(point, radius, depth)| FloodCenter::new("C", point, radius, depth).unwrap())
}

fn arb_station() -> impl Strategy<Value = WseStation> {
    (arb_point(), -2.0f64..30.0).prop_map(|(location, wse)| WseStation {
        gauge_id: GaugeId::new("G"),
        location,
        wse,
    })
}

/// Loan inputs spanning cheap, unaffordable and underwater loans.
fn arb_pricing_inputs() -> impl Strategy<Value = PricingInputs> {
    (
        10_000.0f64..1_000_000.0,
        10_000.0f64..2_000_000.0,
        0.0f64..300_000.0,
        0.0f64..0.12,
        0.0f64..0.01,
        5.0f64..35.0,
        0.0f64..1.0,
        0.0f64..0.9,
    )
        .prop_map(
            |(loan, value, income, rate, insurance, original, remaining_share, haircut)| PricingInputs {
                loan_amount: loan,
                property_value: value,
                gross_income: income,
                annual_rate: rate,
                insurance_rate: insurance,
                original_maturity_years: original,
                current_term_years: original * remaining_share,
                recovery_haircut: haircut,
            },
        )
}

/// Parallel impact and value vectors for a small portfolio.
fn arb_exposures() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..25).prop_flat_map(|n| {
        (
            prop::collection::vec(0.0f64..1.0, n),
            prop::collection::vec(10_000.0f64..1_000_000.0, n),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ===================================================================
    // INVARIANT 1: Depth is never negative and never NaN.
    //
    // Both strategies clamp, whatever the geometry or elevations.
    // ===================================================================
    #[test]
    fn radial_depth_non_negative(
        centers in prop::collection::vec(arb_center(), 1..6),
        property in arb_property(),
    ) {
        let interp = FloodDepthInterpolator::RadialDecay(FloodEvent::from_centers(centers.clone()));
        let depth = interp.depth_at(&property);
        prop_assert!(depth.is_finite() && depth >= 0.0, "depth {}", depth);

        let deepest = centers.iter().map(|c| c.peak_depth_m).fold(0.0, f64::max);
        prop_assert!(depth <= deepest + 1e-12, "depth {} exceeds deepest center {}", depth, deepest);
    }

    #[test]
    fn idw_depth_non_negative(
        stations in prop::collection::vec(arb_station(), 0..8),
        property in arb_property(),
    ) {
        let interp = FloodDepthInterpolator::InverseDistanceWse(WseField::new(stations));
        let depth = interp.depth_at(&property);
        prop_assert!(depth.is_finite() && depth >= 0.0, "depth {}", depth);
    }

    // ===================================================================
    // INVARIANT 2: Impact ratio lies in [0, 1] and grows with depth.
    // ===================================================================
    #[test]
    fn impact_ratio_bounded_and_monotone(
        property in arb_property(),
        a in 0.0f64..10.0,
        b in 0.0f64..10.0,
    ) {
        let f = DepthDamageFunction::default();
        let (shallow, deep) = if a <= b { (a, b) } else { (b, a) };
        let low = f.impact_ratio(shallow, &property);
        let high = f.impact_ratio(deep, &property);
        prop_assert!((0.0..=1.0).contains(&low));
        prop_assert!((0.0..=1.0).contains(&high));
        prop_assert!(low <= high + 1e-12, "impact {} at {} m > {} at {} m", low, shallow, high, deep);
    }

    // ===================================================================
    // INVARIANT 3: Correlation matrix is symmetric with unit diagonal.
    //
    // Off-diagonal entries never exceed the base correlation.
    // ===================================================================
    #[test]
    fn correlation_matrix_well_formed(points in prop::collection::vec(arb_point(), 1..30)) {
        let config = CorrelationConfig::default();
        let m = CorrelationMatrix::from_points(&points, &config);
        prop_assert_eq!(m.dim(), points.len());
        for i in 0..m.dim() {
            prop_assert_eq!(m.get(i, i), 1.0);
            for j in 0..m.dim() {
                prop_assert_eq!(m.get(i, j), m.get(j, i));
                if i != j {
                    let rho = m.get(i, j);
                    prop_assert!(rho >= 0.0 && rho <= config.base_correlation, "rho {}", rho);
                }
            }
        }
    }

    // ===================================================================
    // INVARIANT 4: Survival is a probability that never increases.
    //
    // Per-period default probabilities add up to at most one.
    // ===================================================================
    #[test]
    fn survival_non_increasing(inputs in arb_pricing_inputs()) {
        let outcome = MortgagePricer::default().price(&inputs);
        let result = outcome.result();
        let mut previous = 1.0;
        for state in &result.schedule {
            prop_assert!((0.0..=1.0).contains(&state.survival_probability));
            prop_assert!(state.survival_probability <= previous + 1e-12);
            prop_assert!(state.default_probability >= 0.0);
            previous = state.survival_probability;
        }
        prop_assert!(result.cumulative_default_probability() <= 1.0 + 1e-9);
        prop_assert!(result.fair_value.is_finite());
        prop_assert!(result.credit_spread > 0.0);
    }

    // ===================================================================
    // INVARIANT 5: Tail metrics are ordered.
    //
    // min ≤ VaR95 ≤ VaR99 ≤ max and each ES is at least its VaR.
    // ===================================================================
    #[test]
    fn loss_metrics_ordered((impacts, values) in arb_exposures(), seed in any::<u64>()) {
        let sim = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            n_simulations: 300,
            seed,
            ..Default::default()
        });
        let dist = sim.simulate(&impacts, &values, None);
        let m = dist.metrics();
        prop_assert_eq!(m.simulations, 300);
        prop_assert!(m.min_loss <= m.var_95 + 1e-9);
        prop_assert!(m.var_95 <= m.var_99 + 1e-9);
        prop_assert!(m.var_99 <= m.max_loss + 1e-9);
        prop_assert!(m.es_95 >= m.var_95, "es95 {} < var95 {}", m.es_95, m.var_95);
        prop_assert!(m.es_99 >= m.var_99, "es99 {} < var99 {}", m.es_99, m.var_99);

        let exposure: f64 = values.iter().sum();
        prop_assert!(m.min_loss >= 0.0);
        prop_assert!(m.max_loss <= exposure + 1e-6);
    }

    // ===================================================================
    // INVARIANT 6: Simulation is deterministic for a seed.
    //
    // The same seed yields identical losses, correlated or not.
    // ===================================================================
    #[test]
    fn simulation_is_deterministic(
        points in prop::collection::vec(arb_point(), 1..12),
        seed in any::<u64>(),
    ) {
        let n = points.len();
        let impacts = vec![0.25; n];
        let values = vec![300_000.0; n];
        let matrix = CorrelationMatrix::from_points(&points, &CorrelationConfig::default());
        let sim = PortfolioMonteCarloSimulator::new(MonteCarloConfig {
            n_simulations: 600,
            seed,
            ..Default::default()
        });
        let a = sim.simulate(&impacts, &values, Some(&matrix));
        let b = sim.simulate(&impacts, &values, Some(&matrix));
        prop_assert_eq!(a.losses(), b.losses());
    }
}
