//! Input records: properties, gauges and their readings, mortgages.

pub mod error;
pub mod gauge;
pub mod geo;
pub mod mortgage;
pub mod property;
