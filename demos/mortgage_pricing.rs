//! Flood-linked mortgage pricing.
//!
//! Prices the same loan against increasingly damaged collateral, then
//! shows the fixed spread for a borrower with no income.

use flood_risk_engine::core::mortgage::Mortgage;
use flood_risk_engine::credit::pricer::{MortgagePricer, PricingInputs};
use rust_decimal_macros::dec;

fn main() {
    println!("╔═══════════════════════════════════════════════╗");
    println!("║  flood-risk-engine: Mortgage Pricing Example  ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let pricer = MortgagePricer::default();
    let mortgage = Mortgage::new("M-1001", "P-1001", dec!(320000), 0.045, 300, 264, dec!(95000)).unwrap();
    let collateral = 450_000.0;

    // --- Scenario 1: flood impact sweep ---
    println!("━━━ Scenario 1: Flood Impact Sweep ━━━\n");
    println!(
        "  {:>7}  {:>12}  {:>8}  {:>7}  {:>9}",
        "impact", "fair value", "spread", "LTV", "discount"
    );
    for impact in [0.0, 0.1, 0.25, 0.4, 0.6, 0.8] {
        let inputs = PricingInputs::from_mortgage(&mortgage, collateral).with_flood_impact(impact);
        let outcome = pricer.price(&inputs);
        let r = outcome.result();
        println!(
            "  {:>7.2}  {:>12.2}  {:>7.3}%  {:>7.3}  {:>8.2}%",
            impact,
            r.fair_value,
            r.credit_spread * 100.0,
            r.ltv_ratio,
            r.discount_percentage
        );
    }
    println!();

    // --- Scenario 2: full result for a heavily flooded property ---
    println!("━━━ Scenario 2: Heavily Flooded Collateral ━━━\n");
    let inputs = PricingInputs::from_mortgage(&mortgage, collateral).with_flood_impact(0.6);
    let outcome = pricer.price(&inputs);
    println!("{}", outcome.result());
    println!(
        "  Cumulative default probability: {:.2}%\n",
        outcome.result().cumulative_default_probability() * 100.0
    );

    // --- Scenario 3: borrower with no income ---
    println!("━━━ Scenario 3: Zero Income ━━━\n");
    let no_income = Mortgage::new("M-1002", "P-1002", dec!(180000), 0.04, 300, 240, dec!(0)).unwrap();
    let inputs = PricingInputs::from_mortgage(&no_income, 260_000.0);
    println!("  Credit spread: {:.1}%", pricer.credit_spread(&inputs) * 100.0);
}
