//! Mortgage credit pricing: spread curve, amortization state machine and
//! portfolio aggregates.

pub mod portfolio;
pub mod pricer;
pub mod spread;
