//! Portfolio-level aggregates over mortgage pricing results.

use crate::credit::pricer::MortgagePricing;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spread above which a mortgage counts as high risk.
pub const HIGH_RISK_SPREAD: f64 = 0.10;

/// Aggregates over successfully priced mortgages. Fallback results are
/// counted in `fallback_count` only.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingPortfolioMetrics {
    pub total_mortgages: usize,
    pub total_fair_value: f64,
    pub average_fair_value: f64,
    pub average_credit_spread: f64,
    pub median_credit_spread: f64,
    pub average_discount_percentage: f64,
    pub total_discount_to_par: f64,
    pub average_ltv: f64,
    pub high_risk_mortgages: usize,
    pub fallback_count: usize,
}

impl PricingPortfolioMetrics {
    pub fn from_results(results: &[MortgagePricing]) -> Self {
        let priced: Vec<_> = results
            .iter()
            .filter(|r| !r.outcome.is_fallback())
            .map(|r| r.outcome.result())
            .collect();
        let fallback_count = results.len() - priced.len();
        if priced.is_empty() {
            return Self {
                fallback_count,
                ..Default::default()
            };
        }

        let n = priced.len() as f64;
        let total_fair_value: f64 = priced.iter().map(|r| r.fair_value).sum();
        let mut spreads: Vec<f64> = priced.iter().map(|r| r.credit_spread).collect();
        spreads.sort_by(f64::total_cmp);

        Self {
            total_mortgages: priced.len(),
            total_fair_value,
            average_fair_value: total_fair_value / n,
            average_credit_spread: spreads.iter().sum::<f64>() / n,
            median_credit_spread: median(&spreads),
            average_discount_percentage: priced.iter().map(|r| r.discount_percentage).sum::<f64>() / n,
            total_discount_to_par: priced.iter().map(|r| r.discount_to_par).sum(),
            average_ltv: priced.iter().map(|r| r.ltv_ratio).sum::<f64>() / n,
            high_risk_mortgages: spreads.iter().filter(|s| **s > HIGH_RISK_SPREAD).count(),
            fallback_count,
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

impl fmt::Display for PricingPortfolioMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Mortgage Portfolio ===")?;
        writeln!(f, "  Priced:            {} ({} fallback)", self.total_mortgages, self.fallback_count)?;
        writeln!(f, "  Total fair value:  {:.2}", self.total_fair_value)?;
        writeln!(f, "  Discount to par:   {:.2}", self.total_discount_to_par)?;
        writeln!(
            f,
            "  Spread avg/median: {:.3}% / {:.3}%",
            self.average_credit_spread * 100.0,
            self.median_credit_spread * 100.0
        )?;
        writeln!(f, "  Average LTV:       {:.3}", self.average_ltv)?;
        writeln!(f, "  High-risk loans:   {}", self.high_risk_mortgages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mortgage::MortgageId;
    use crate::core::property::PropertyId;
    use crate::credit::pricer::{MortgagePricer, PricingInputs, PricingRequest};

    fn request(id: &str, income: f64, rate: f64) -> PricingRequest {
        PricingRequest {
            mortgage_id: MortgageId::new(id),
            property_id: PropertyId::new(format!("P-{}", id)),
            flood_impact_ratio: 0.0,
            inputs: PricingInputs {
                loan_amount: 250_000.0,
                property_value: 400_000.0,
                gross_income: income,
                annual_rate: rate,
                insurance_rate: 0.002,
                original_maturity_years: 25.0,
                current_term_years: 20.0,
                recovery_haircut: 0.2,
            },
        }
    }

    #[test]
    fn test_aggregates_exclude_fallbacks() {
        let requests = vec![
            request("A", 90_000.0, 0.04),
            request("B", 0.0, 0.04),
            request("C", 60_000.0, f64::NAN),
        ];
        let results = MortgagePricer::default().price_batch(&requests);
        let metrics = PricingPortfolioMetrics::from_results(&results);
        assert_eq!(metrics.total_mortgages, 2);
        assert_eq!(metrics.fallback_count, 1);
        assert_eq!(metrics.high_risk_mortgages, 1);
        let expected_total = results[0].outcome.result().fair_value + results[1].outcome.result().fair_value;
        assert!((metrics.total_fair_value - expected_total).abs() < 1e-6);
        assert!((metrics.average_ltv - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[1.0, 2.0, 9.0]), 2.0);
        assert_eq!(median(&[1.0, 2.0, 4.0, 9.0]), 3.0);
    }

    #[test]
    fn test_all_fallback() {
        let results = MortgagePricer::default().price_batch(&[request("X", 1.0, f64::INFINITY)]);
        let metrics = PricingPortfolioMetrics::from_results(&results);
        assert_eq!(metrics.total_mortgages, 0);
        assert_eq!(metrics.fallback_count, 1);
    }
}
