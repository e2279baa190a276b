use crate::core::error::InputError;
use crate::core::property::PropertyId;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a mortgage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MortgageId(String);

impl MortgageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MortgageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A loan secured against one property in the portfolio.
///
/// Rates are decimals (`0.035` = 3.5%). Terms are in months.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::core::mortgage::Mortgage;
/// use rust_decimal_macros::dec;
///
/// let m = Mortgage::new("MTG-1", "PROP-1", dec!(400000), 0.035, 360, 300, dec!(75000)).unwrap();
/// assert_eq!(m.remaining_term_years(), 25.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mortgage {
    id: MortgageId,
    property_id: PropertyId,
    loan_amount: Decimal,
    annual_rate: f64,
    original_term_months: u32,
    remaining_term_months: u32,
    gross_income: Decimal,
    /// Annual insurance premium as a fraction of property value.
    insurance_rate: f64,
    /// Fraction of collateral value lost on forced sale.
    recovery_haircut: f64,
    /// Collateral value stated on the loan file, used when the linked
    /// property is not in the portfolio.
    stated_property_value: Option<Decimal>,
}

impl Mortgage {
    pub const DEFAULT_INSURANCE_RATE: f64 = 0.002;
    pub const DEFAULT_RECOVERY_HAIRCUT: f64 = 0.2;

    pub fn new(
        id: impl Into<String>,
        property_id: impl Into<String>,
        loan_amount: Decimal,
        annual_rate: f64,
        original_term_months: u32,
        remaining_term_months: u32,
        gross_income: Decimal,
    ) -> Result<Self, InputError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(InputError::EmptyIdentifier { kind: "mortgage" });
        }
        let property_id = property_id.into();
        if property_id.trim().is_empty() {
            return Err(InputError::EmptyIdentifier { kind: "property" });
        }
        if loan_amount <= Decimal::ZERO {
            return Err(InputError::NotPositive {
                id,
                field: "loan_amount",
                value: loan_amount.to_string(),
            });
        }
        if !annual_rate.is_finite() {
            return Err(InputError::NonFinite {
                id,
                field: "annual_rate",
                value: annual_rate,
            });
        }
        if original_term_months == 0 {
            return Err(InputError::NotPositive {
                id,
                field: "original_term_months",
                value: "0".to_string(),
            });
        }
        if remaining_term_months > original_term_months {
            return Err(InputError::TermMismatch {
                id,
                remaining: remaining_term_months,
                original: original_term_months,
            });
        }
        Ok(Self {
            id: MortgageId::new(id),
            property_id: PropertyId::new(property_id),
            loan_amount,
            annual_rate,
            original_term_months,
            remaining_term_months,
            gross_income,
            insurance_rate: Self::DEFAULT_INSURANCE_RATE,
            recovery_haircut: Self::DEFAULT_RECOVERY_HAIRCUT,
            stated_property_value: None,
        })
    }

    pub fn with_insurance_rate(mut self, rate: f64) -> Result<Self, InputError> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(InputError::Negative {
                id: self.id.to_string(),
                field: "insurance_rate",
                value: rate.to_string(),
            });
        }
        self.insurance_rate = rate;
        Ok(self)
    }

    pub fn with_recovery_haircut(mut self, haircut: f64) -> Result<Self, InputError> {
        if !(0.0..=1.0).contains(&haircut) {
            return Err(InputError::OutOfUnitRange {
                id: self.id.to_string(),
                field: "recovery_haircut",
                value: haircut,
            });
        }
        self.recovery_haircut = haircut;
        Ok(self)
    }

    pub fn with_stated_property_value(mut self, value: Decimal) -> Self {
        self.stated_property_value = Some(value);
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> &MortgageId {
        &self.id
    }

    pub fn property_id(&self) -> &PropertyId {
        &self.property_id
    }

    pub fn loan_amount(&self) -> Decimal {
        self.loan_amount
    }

    pub fn loan_amount_f64(&self) -> f64 {
        self.loan_amount.to_f64().unwrap_or(0.0)
    }

    pub fn annual_rate(&self) -> f64 {
        self.annual_rate
    }

    pub fn original_term_months(&self) -> u32 {
        self.original_term_months
    }

    pub fn remaining_term_months(&self) -> u32 {
        self.remaining_term_months
    }

    pub fn original_term_years(&self) -> f64 {
        f64::from(self.original_term_months) / 12.0
    }

    pub fn remaining_term_years(&self) -> f64 {
        f64::from(self.remaining_term_months) / 12.0
    }

    pub fn gross_income(&self) -> Decimal {
        self.gross_income
    }

    pub fn gross_income_f64(&self) -> f64 {
        self.gross_income.to_f64().unwrap_or(0.0)
    }

    pub fn insurance_rate(&self) -> f64 {
        self.insurance_rate
    }

    pub fn recovery_haircut(&self) -> f64 {
        self.recovery_haircut
    }

    pub fn stated_property_value(&self) -> Option<Decimal> {
        self.stated_property_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Mortgage {
        Mortgage::new("M1", "P1", dec!(200000), 0.04, 300, 240, dec!(60000)).unwrap()
    }

    #[test]
    fn test_mortgage_defaults() {
        let m = sample();
        assert_eq!(m.insurance_rate(), Mortgage::DEFAULT_INSURANCE_RATE);
        assert_eq!(m.recovery_haircut(), Mortgage::DEFAULT_RECOVERY_HAIRCUT);
        assert_eq!(m.original_term_years(), 25.0);
        assert_eq!(m.remaining_term_years(), 20.0);
    }

    #[test]
    fn test_zero_income_is_accepted() {
        let m = Mortgage::new("M1", "P1", dec!(1000), 0.04, 12, 12, Decimal::ZERO);
        assert!(m.is_ok());
    }

    #[test]
    fn test_rejects_bad_terms() {
        assert!(Mortgage::new("M1", "P1", dec!(1000), 0.04, 0, 0, dec!(1)).is_err());
        assert!(matches!(
            Mortgage::new("M1", "P1", dec!(1000), 0.04, 120, 240, dec!(1)),
            Err(InputError::TermMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_non_positive_loan() {
        assert!(Mortgage::new("M1", "P1", dec!(0), 0.04, 12, 12, dec!(1)).is_err());
    }

    #[test]
    fn test_haircut_range() {
        assert!(sample().with_recovery_haircut(1.2).is_err());
        assert_eq!(sample().with_recovery_haircut(0.3).unwrap().recovery_haircut(), 0.3);
    }
}
