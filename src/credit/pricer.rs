//! Mortgage credit pricing under a constant-hazard default process.
//!
//! The loan is amortized month by month. Each period carries an outstanding
//! balance, a hazard rate derived from the credit spread, a survival
//! probability and a loss given default. Expected cashflows net of expected
//! losses are discounted at the contract rate to give a fair value.

use crate::core::error::ConfigError;
use crate::core::mortgage::{Mortgage, MortgageId};
use crate::core::property::PropertyId;
use crate::credit::spread::{ltv_risk_factor, CreditSpreadCurve, SpreadInputs};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Spread reported on a fallback result.
pub const FALLBACK_SPREAD: f64 = 0.10;

/// Fraction of the loan a fallback result is valued at.
pub const FALLBACK_VALUE_RATIO: f64 = 0.9;

/// Longest amortization schedule priced, in months.
pub const MAX_PERIODS: usize = 1200;

const MAX_RECOVERY_HAIRCUT: f64 = 0.95;
const MIN_RATE: f64 = 0.001;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PricingError {
    #[error("{field} is not a finite number: {value}")]
    NonFiniteInput { field: &'static str, value: f64 },
    #[error("amortization produced a non-finite {quantity} at period {period}")]
    NonFiniteResult { quantity: &'static str, period: usize },
    #[error("remaining term yields no payment periods")]
    EmptySchedule,
    #[error("remaining term of {periods} months exceeds the {max}-month limit")]
    TermTooLong { periods: usize, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Borrower income tax rate used for affordability.
    pub tax_rate: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { tax_rate: 0.20 }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(ConfigError::OutOfRange {
                field: "tax_rate",
                value: self.tax_rate,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Loan, borrower and collateral quantities for one pricing run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingInputs {
    pub loan_amount: f64,
    pub property_value: f64,
    pub gross_income: f64,
    pub annual_rate: f64,
    pub insurance_rate: f64,
    pub original_maturity_years: f64,
    pub current_term_years: f64,
    pub recovery_haircut: f64,
}

impl PricingInputs {
    /// Inputs for a mortgage secured on collateral worth `property_value`.
    pub fn from_mortgage(mortgage: &Mortgage, property_value: f64) -> Self {
        Self {
            loan_amount: mortgage.loan_amount_f64(),
            property_value,
            gross_income: mortgage.gross_income_f64(),
            annual_rate: mortgage.annual_rate(),
            insurance_rate: mortgage.insurance_rate(),
            original_maturity_years: mortgage.original_term_years(),
            current_term_years: mortgage.remaining_term_years(),
            recovery_haircut: mortgage.recovery_haircut(),
        }
    }

    /// Impair collateral by a flood impact ratio and load insurance with it.
    pub fn with_flood_impact(mut self, impact_ratio: f64) -> Self {
        let impact = if impact_ratio.is_finite() {
            impact_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.property_value *= 1.0 - impact;
        self.insurance_rate *= 1.0 + impact;
        self
    }

    fn check_finite(&self) -> Result<(), PricingError> {
        let fields = [
            ("loan_amount", self.loan_amount),
            ("property_value", self.property_value),
            ("gross_income", self.gross_income),
            ("annual_rate", self.annual_rate),
            ("insurance_rate", self.insurance_rate),
            ("original_maturity_years", self.original_maturity_years),
            ("current_term_years", self.current_term_years),
            ("recovery_haircut", self.recovery_haircut),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(PricingError::NonFiniteInput { field, value });
            }
        }
        Ok(())
    }

    /// Clamp every quantity into the range the amortization can handle.
    pub fn sanitized(&self) -> Self {
        let original = self.original_maturity_years.max(1.0);
        Self {
            loan_amount: self.loan_amount.max(1.0),
            property_value: self.property_value.max(1.0),
            gross_income: self.gross_income.max(1.0),
            annual_rate: self.annual_rate.max(MIN_RATE),
            insurance_rate: self.insurance_rate.max(0.0),
            original_maturity_years: original,
            current_term_years: self.current_term_years.min(original).max(0.5),
            recovery_haircut: self.recovery_haircut.clamp(0.0, MAX_RECOVERY_HAIRCUT),
        }
    }

    /// Whole months left on the loan.
    pub fn n_periods(&self) -> usize {
        // Tolerance keeps a whole number of months from flooring one short.
        (self.current_term_years * 12.0 + 1e-9).floor() as usize
    }
}

/// Level annuity payment.
pub fn monthly_payment(principal: f64, monthly_rate: f64, n_periods: usize) -> f64 {
    if n_periods == 0 {
        return principal;
    }
    if monthly_rate == 0.0 {
        return principal / n_periods as f64;
    }
    principal * monthly_rate / (1.0 - (1.0 + monthly_rate).powf(-(n_periods as f64)))
}

/// State at the end of one monthly period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodState {
    pub period: usize,
    pub balance: f64,
    pub hazard_rate: f64,
    pub survival_probability: f64,
    pub loss_given_default: f64,
    /// Probability of defaulting during this period.
    pub default_probability: f64,
    pub expected_cashflow: f64,
    pub expected_loss: f64,
    pub discount_factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub fair_value: f64,
    pub credit_spread: f64,
    pub monthly_payment: f64,
    pub annual_payment: f64,
    /// Period 0 is the initial state; periods `1..=n` carry cashflows.
    pub schedule: Vec<PeriodState>,
    pub pv_expected_cashflows: f64,
    pub pv_expected_losses: f64,
    pub discount_to_par: f64,
    pub discount_percentage: f64,
    pub ltv_ratio: f64,
    pub ltv_risk_factor: f64,
    pub affordability_ratio: f64,
}

impl PricingResult {
    pub fn n_periods(&self) -> usize {
        self.schedule.len().saturating_sub(1)
    }

    /// Probability of default at any point before maturity.
    pub fn cumulative_default_probability(&self) -> f64 {
        self.schedule.iter().map(|s| s.default_probability).sum()
    }
}

impl fmt::Display for PricingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Mortgage Pricing ===")?;
        writeln!(f, "  Fair value:        {:.2}", self.fair_value)?;
        writeln!(f, "  Credit spread:     {:.3}%", self.credit_spread * 100.0)?;
        writeln!(f, "  Monthly payment:   {:.2}", self.monthly_payment)?;
        writeln!(f, "  PV cashflows:      {:.2}", self.pv_expected_cashflows)?;
        writeln!(f, "  PV losses:         {:.2}", self.pv_expected_losses)?;
        writeln!(
            f,
            "  Discount to par:   {:.2} ({:.2}%)",
            self.discount_to_par, self.discount_percentage
        )?;
        writeln!(f, "  LTV:               {:.3} (factor {:.1})", self.ltv_ratio, self.ltv_risk_factor)?;
        writeln!(f, "  Affordability:     {:.3}", self.affordability_ratio)
    }
}

/// Result of pricing one mortgage. A failure still carries a usable,
/// conservative result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PricingOutcome {
    Priced(PricingResult),
    Fallback { result: PricingResult, error: String },
}

impl PricingOutcome {
    pub fn result(&self) -> &PricingResult {
        match self {
            PricingOutcome::Priced(result) => result,
            PricingOutcome::Fallback { result, .. } => result,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PricingOutcome::Fallback { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PricingOutcome::Priced(_) => None,
            PricingOutcome::Fallback { error, .. } => Some(error),
        }
    }
}

/// Pricing of one mortgage inside a portfolio run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgagePricing {
    pub mortgage_id: MortgageId,
    pub property_id: PropertyId,
    /// Impact ratio of the linked property, 0 when it is not in the portfolio.
    pub flood_impact_ratio: f64,
    pub outcome: PricingOutcome,
}

/// A mortgage ready for batch pricing.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRequest {
    pub mortgage_id: MortgageId,
    pub property_id: PropertyId,
    pub flood_impact_ratio: f64,
    pub inputs: PricingInputs,
}

#[derive(Debug, Clone, Default)]
pub struct MortgagePricer {
    config: PricingConfig,
    curve: CreditSpreadCurve,
}

impl MortgagePricer {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config,
            curve: CreditSpreadCurve::default(),
        }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Credit spread for `inputs`. Stated income at or below zero gives
    /// the fixed default spread before any sanitation.
    pub fn credit_spread(&self, inputs: &PricingInputs) -> f64 {
        let clean = inputs.sanitized();
        let payment = monthly_payment(clean.loan_amount, clean.annual_rate / 12.0, clean.n_periods());
        self.curve.credit_spread(&self.spread_inputs(inputs.gross_income, &clean, payment * 12.0))
    }

    fn spread_inputs(&self, gross_income: f64, clean: &PricingInputs, annual_payment: f64) -> SpreadInputs {
        SpreadInputs {
            gross_income,
            annual_payment,
            insurance_rate: clean.insurance_rate,
            property_value: clean.property_value,
            original_maturity_years: clean.original_maturity_years,
            current_term_years: clean.current_term_years,
            tax_rate: self.config.tax_rate,
        }
    }

    /// Run the amortization state machine.
    pub fn try_price(&self, inputs: &PricingInputs) -> Result<PricingResult, PricingError> {
        inputs.check_finite()?;
        let clean = inputs.sanitized();
        let n = clean.n_periods();
        if n == 0 {
            return Err(PricingError::EmptySchedule);
        }
        if n > MAX_PERIODS {
            return Err(PricingError::TermTooLong {
                periods: n,
                max: MAX_PERIODS,
            });
        }

        let monthly_rate = clean.annual_rate / 12.0;
        let payment = monthly_payment(clean.loan_amount, monthly_rate, n);
        let annual_payment = payment * 12.0;
        let spread_inputs = self.spread_inputs(inputs.gross_income, &clean, annual_payment);
        let spread = self.curve.credit_spread(&spread_inputs);

        let hazard = 1.0 - (-spread / 12.0).exp();
        let recovery_value = (1.0 - clean.recovery_haircut) * clean.property_value;

        let mut schedule = Vec::with_capacity(n + 1);
        schedule.push(PeriodState {
            period: 0,
            balance: clean.loan_amount,
            hazard_rate: 0.0,
            survival_probability: 1.0,
            loss_given_default: (clean.loan_amount - recovery_value).max(0.0),
            discount_factor: 1.0,
            ..Default::default()
        });

        let mut pv_cashflows = 0.0;
        let mut pv_losses = 0.0;
        let mut discount_factor = 1.0;
        for i in 1..=n {
            let prev = schedule[i - 1];
            let interest = prev.balance * monthly_rate;
            let principal = payment - interest;
            let balance = (prev.balance - principal).max(0.0);
            let lgd = (balance - recovery_value).max(0.0);
            let survival = prev.survival_probability * (1.0 - prev.hazard_rate);
            let default_probability = (prev.survival_probability - survival).max(0.0);
            let expected_cashflow = payment * survival + (prev.balance - lgd) * default_probability;
            let expected_loss = lgd * default_probability;
            discount_factor /= 1.0 + monthly_rate;

            if !(expected_cashflow.is_finite() && expected_loss.is_finite() && discount_factor.is_finite()) {
                return Err(PricingError::NonFiniteResult {
                    quantity: "expected cashflow",
                    period: i,
                });
            }
            pv_cashflows += expected_cashflow * discount_factor;
            pv_losses += expected_loss * discount_factor;

            schedule.push(PeriodState {
                period: i,
                balance,
                hazard_rate: hazard,
                survival_probability: survival,
                loss_given_default: lgd,
                default_probability,
                expected_cashflow,
                expected_loss,
                discount_factor,
            });
        }

        let fair_value = pv_cashflows - pv_losses;
        if !fair_value.is_finite() {
            return Err(PricingError::NonFiniteResult {
                quantity: "fair value",
                period: n,
            });
        }
        let discount = clean.loan_amount - fair_value;
        let ltv = clean.loan_amount / clean.property_value;
        let affordability = SpreadInputs {
            gross_income: clean.gross_income,
            ..spread_inputs
        }
        .affordability_ratio();

        debug!(
            "priced loan {:.0} over {} periods: spread {:.4}, fair value {:.2}",
            clean.loan_amount, n, spread, fair_value
        );

        Ok(PricingResult {
            fair_value,
            credit_spread: spread,
            monthly_payment: payment,
            annual_payment,
            schedule,
            pv_expected_cashflows: pv_cashflows,
            pv_expected_losses: pv_losses,
            discount_to_par: discount,
            discount_percentage: discount / clean.loan_amount * 100.0,
            ltv_ratio: ltv,
            ltv_risk_factor: ltv_risk_factor(ltv),
            affordability_ratio: affordability,
        })
    }

    /// Price one mortgage, substituting the conservative fallback on error.
    pub fn price(&self, inputs: &PricingInputs) -> PricingOutcome {
        match self.try_price(inputs) {
            Ok(result) => PricingOutcome::Priced(result),
            Err(err) => {
                warn!("pricing failed ({}); using fallback valuation", err);
                PricingOutcome::Fallback {
                    result: Self::fallback(inputs),
                    error: err.to_string(),
                }
            }
        }
    }

    /// Conservative valuation used when the state machine cannot run.
    pub fn fallback(inputs: &PricingInputs) -> PricingResult {
        let loan = if inputs.loan_amount.is_finite() {
            inputs.loan_amount.max(1.0)
        } else {
            1.0
        };
        let ltv = if inputs.property_value.is_finite() && inputs.property_value > 0.0 {
            loan / inputs.property_value
        } else {
            1.0
        };
        PricingResult {
            fair_value: loan * FALLBACK_VALUE_RATIO,
            credit_spread: FALLBACK_SPREAD,
            monthly_payment: loan * 0.08 / 12.0,
            annual_payment: loan * 0.08,
            schedule: vec![PeriodState {
                period: 0,
                balance: loan,
                hazard_rate: 0.05,
                survival_probability: 1.0,
                loss_given_default: loan * 0.3,
                discount_factor: 1.0,
                ..Default::default()
            }],
            pv_expected_cashflows: loan,
            pv_expected_losses: loan * 0.1,
            discount_to_par: loan * 0.1,
            discount_percentage: 10.0,
            ltv_ratio: ltv,
            ltv_risk_factor: ltv_risk_factor(ltv),
            affordability_ratio: 0.5,
        }
    }

    /// Price a batch in parallel. One bad record never aborts the batch.
    pub fn price_batch(&self, requests: &[PricingRequest]) -> Vec<MortgagePricing> {
        requests
            .par_iter()
            .map(|req| MortgagePricing {
                mortgage_id: req.mortgage_id.clone(),
                property_id: req.property_id.clone(),
                flood_impact_ratio: req.flood_impact_ratio,
                outcome: self.price(&req.inputs),
            })
            .collect()
    }
}
