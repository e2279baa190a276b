//! Affordability-driven credit spread.

use serde::{Deserialize, Serialize};

/// Spread applied when the borrower has no usable income on record.
pub const ZERO_INCOME_SPREAD: f64 = 0.15;

/// Floor on any computed spread.
pub const MIN_SPREAD: f64 = 0.001;

/// Control points `(affordability ratio, annual spread)`.
const STANDARD_SPREADS: [(f64, f64); 10] = [
    (0.1, 0.005),
    (0.2, 0.01),
    (0.3, 0.02),
    (0.4, 0.03),
    (0.5, 0.05),
    (0.6, 0.08),
    (0.7, 0.12),
    (0.8, 0.18),
    (0.9, 0.25),
    (1.0, 0.35),
];

/// Borrower and loan quantities the spread depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadInputs {
    pub gross_income: f64,
    pub annual_payment: f64,
    pub insurance_rate: f64,
    pub property_value: f64,
    pub original_maturity_years: f64,
    pub current_term_years: f64,
    pub tax_rate: f64,
}

impl SpreadInputs {
    /// Annual housing cost over after-tax income, unclamped.
    pub fn affordability_ratio(&self) -> f64 {
        let after_tax = self.gross_income * (1.0 - self.tax_rate);
        (self.annual_payment + self.insurance_rate * self.property_value) / after_tax
    }
}

/// Monotone lookup from affordability ratio to annual credit spread.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::credit::spread::CreditSpreadCurve;
///
/// let curve = CreditSpreadCurve::default();
/// assert_eq!(curve.base_spread(0.5), 0.05);
/// assert_eq!(curve.base_spread(3.0), 0.35);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSpreadCurve {
    points: Vec<(f64, f64)>,
}

impl Default for CreditSpreadCurve {
    fn default() -> Self {
        Self {
            points: STANDARD_SPREADS.to_vec(),
        }
    }
}

impl CreditSpreadCurve {
    /// Spread at an affordability ratio clamped to the curve's domain.
    pub fn base_spread(&self, affordability: f64) -> f64 {
        let (lo, _) = self.points[0];
        let (hi, y_hi) = self.points[self.points.len() - 1];
        if affordability.is_nan() {
            return y_hi;
        }
        let x = affordability.clamp(lo, hi);
        for window in self.points.windows(2) {
            let (x0, y0) = window[0];
            let (x1, y1) = window[1];
            if x <= x1 {
                if x == x1 {
                    return y1;
                }
                return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
            }
        }
        y_hi
    }

    /// Annual credit spread for a borrower.
    ///
    /// Zero or negative income short-circuits to [`ZERO_INCOME_SPREAD`].
    pub fn credit_spread(&self, inputs: &SpreadInputs) -> f64 {
        if inputs.gross_income.is_nan() || inputs.gross_income <= 0.0 {
            return ZERO_INCOME_SPREAD;
        }
        let base = self.base_spread(inputs.affordability_ratio());
        let factor = term_factor(inputs.current_term_years, inputs.original_maturity_years);
        (base * factor).max(MIN_SPREAD)
    }
}

/// Longer remaining terms carry slightly wider spreads.
pub fn term_factor(current_term_years: f64, original_maturity_years: f64) -> f64 {
    let original = original_maturity_years.max(1.0);
    let current = current_term_years.max(0.5);
    1.0 + (current - original / 2.0) / 100.0
}

/// Loan-to-value risk multiplier.
pub fn ltv_risk_factor(ltv: f64) -> f64 {
    if ltv > 0.95 {
        1.5
    } else if ltv > 0.9 {
        1.3
    } else if ltv > 0.8 {
        1.1
    } else {
        1.0
    }
}
